/*
 * Created on Thu Apr 20 2023
 *
 * This file is a part of Bramble
 * Bramble is a free and open-source in-memory cache server written by
 * Sayan Nandan ("the Author") that keeps keys in a prefix tree so that
 * entire families of keys can be read, rewritten and expired together.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! End-to-end tests: a real server on a real socket, driven by a minimal
//! raw-frame client

use crate::config::{BindConfig, ConfigurationSet};
use crate::corestore::{CoreHandle, Corestore};
use crate::dbnet::{Listener, Terminator};
use crate::protocol::responses::replcode;
use crate::protocol::{encode_query, opcode};
use crate::services;
use crate::util::os;
use std::cell::RefCell;
use std::future::Future;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Boot a server on an ephemeral port, run the test body, tear down
fn run_server<F, Fut>(mut cfg: ConfigurationSet, test: F)
where
    F: FnOnce(SocketAddr, CoreHandle) -> Fut,
    Fut: Future<Output = ()>,
{
    cfg.bind = BindConfig::Tcp {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        let (signal, _) = broadcast::channel(1);
        let store: CoreHandle = Rc::new(RefCell::new(Corestore::new(
            cfg.limits(),
            cfg.compression,
            cfg.gc_ratio,
            os::unix_now(),
            usize::MAX,
        )));
        let cron = tokio::task::spawn_local(services::cron::cron_scheduler(
            store.clone(),
            cfg.cron_period,
            Terminator::new(signal.subscribe()),
        ));
        let mut listener = Listener::bind(&cfg, store.clone(), signal.clone())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::task::spawn_local(async move {
            let _ = listener.run().await;
        });
        test(addr, store).await;
        drop(signal);
        server.abort();
        cron.abort();
    });
}

struct TestClient {
    stream: TcpStream,
}

/// A decoded reply frame
#[derive(Debug, PartialEq)]
struct RawReply {
    code: u8,
    payload: Vec<u8>,
}

impl RawReply {
    /// Split a VAL payload into (encoding, bytes)
    fn val(&self) -> (u8, &[u8]) {
        assert_eq!(self.code, replcode::VAL);
        let len = u32::from_le_bytes(self.payload[1..5].try_into().unwrap()) as usize;
        (self.payload[0], &self.payload[5..5 + len])
    }
    /// Split a KVAL payload into (key, encoding, value) triples
    fn kval(&self) -> Vec<(Vec<u8>, u8, Vec<u8>)> {
        assert_eq!(self.code, replcode::KVAL);
        let count = u32::from_le_bytes(self.payload[0..4].try_into().unwrap()) as usize;
        let mut at = 4;
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let klen = u32::from_le_bytes(self.payload[at..at + 4].try_into().unwrap()) as usize;
            at += 4;
            let key = self.payload[at..at + klen].to_vec();
            at += klen;
            let encoding = self.payload[at];
            at += 1;
            let vlen = u32::from_le_bytes(self.payload[at..at + 4].try_into().unwrap()) as usize;
            at += 4;
            let value = self.payload[at..at + vlen].to_vec();
            at += vlen;
            pairs.push((key, encoding, value));
        }
        assert_eq!(at, self.payload.len());
        pairs
    }
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
        }
    }
    async fn query(&mut self, opc: u16, args: &[&[u8]]) -> RawReply {
        let frame = encode_query(opc, args);
        self.stream.write_all(&frame).await.unwrap();
        let mut size_raw = [0u8; 4];
        self.stream.read_exact(&mut size_raw).await.unwrap();
        let size = u32::from_le_bytes(size_raw) as usize;
        let mut rest = vec![0u8; size];
        self.stream.read_exact(&mut rest).await.unwrap();
        RawReply {
            code: rest[0],
            payload: rest[1..].to_vec(),
        }
    }
    /// Expect the peer to hang up on us
    async fn expect_eof(&mut self) {
        let mut buf = [0u8; 1];
        let got = tokio::time::timeout(
            Duration::from_secs(5),
            self.stream.read(&mut buf),
        )
        .await
        .expect("server did not close the connection")
        .unwrap();
        assert_eq!(got, 0, "expected EOF, got data");
    }
}

#[test]
fn e2e_set_then_get() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        let reply = con.query(opcode::SET, &[b"user:1", b"alice"]).await;
        assert_eq!(reply.val(), (0x00, &b"alice"[..]));
        let reply = con.query(opcode::GET, &[b"user:1"]).await;
        assert_eq!(reply.val(), (0x00, &b"alice"[..]));
    });
}

#[test]
fn e2e_increment_chain() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        con.query(opcode::SET, &[b"n", b"10"]).await;
        let reply = con.query(opcode::INC, &[b"n"]).await;
        assert_eq!(reply.val(), (0x02, &b"11"[..]));
        for _ in 0..9 {
            con.query(opcode::INC, &[b"n"]).await;
        }
        let reply = con.query(opcode::GET, &[b"n"]).await;
        assert_eq!(reply.val(), (0x02, &b"20"[..]));
    });
}

#[test]
fn e2e_compressed_value_comes_back_identical() {
    let mut cfg = ConfigurationSet::default();
    cfg.compression = 64;
    run_server(cfg, |addr, store| async move {
        let payload = vec![b'a'; 8192];
        let mut con = TestClient::connect(addr).await;
        con.query(opcode::SET, &[b"x", &payload]).await;
        // stored compressed on the inside
        assert_eq!(store.borrow().stats.compressed_count, 1);
        let reply = con.query(opcode::GET, &[b"x"]).await;
        let (encoding, data) = reply.val();
        assert_eq!(encoding, 0x00);
        assert_eq!(data, &payload[..]);
    });
}

#[test]
fn e2e_mget_returns_exactly_the_prefix() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        con.query(opcode::SET, &[b"a:1", b"v"]).await;
        con.query(opcode::SET, &[b"a:2", b"v"]).await;
        con.query(opcode::SET, &[b"b:1", b"v"]).await;
        let reply = con.query(opcode::MGET, &[b"a:"]).await;
        let pairs = reply.kval();
        let keys: Vec<&[u8]> = pairs.iter().map(|(k, _, _)| &k[..]).collect();
        assert_eq!(keys, vec![&b"a:1"[..], b"a:2"]);
    });
}

#[test]
fn e2e_ttl_expiry() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        con.query(opcode::SET, &[b"tmp", b"v"]).await;
        assert_eq!(
            con.query(opcode::TTL, &[b"tmp", b"1"]).await.code,
            replcode::OK
        );
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            con.query(opcode::GET, &[b"tmp"]).await.code,
            replcode::ERR_NOT_FOUND
        );
    });
}

#[test]
fn e2e_client_cap_drops_overflow_silently() {
    let mut cfg = ConfigurationSet::default();
    cfg.max_clients = 1;
    run_server(cfg, |addr, _| async move {
        let mut first = TestClient::connect(addr).await;
        // make sure the first session actually holds its slot
        assert_eq!(first.query(opcode::PING, &[]).await.code, replcode::OK);
        let mut second = TestClient::connect(addr).await;
        second.expect_eof().await;
        // and the first client is still being served
        assert_eq!(first.query(opcode::PING, &[]).await.code, replcode::OK);
    });
}

#[test]
fn e2e_lock_window() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        con.query(opcode::SET, &[b"k", b"v1"]).await;
        assert_eq!(con.query(opcode::LOCK, &[b"k", b"0"]).await.code, replcode::OK);
        assert_eq!(
            con.query(opcode::SET, &[b"k", b"v2"]).await.code,
            replcode::ERR_LOCKED
        );
        assert_eq!(con.query(opcode::UNLOCK, &[b"k"]).await.code, replcode::OK);
        assert_eq!(
            con.query(opcode::SET, &[b"k", b"v2"]).await.code,
            replcode::VAL
        );
    });
}

#[test]
fn e2e_end_closes_after_reply() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        assert_eq!(con.query(opcode::END, &[]).await.code, replcode::OK);
        con.expect_eof().await;
    });
}

#[test]
fn e2e_malformed_frame_drops_connection_without_reply() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        // size says 1: below the opcode minimum
        con.stream.write_all(&[1, 0, 0, 0, 0xaa]).await.unwrap();
        con.expect_eof().await;
    });
}

#[test]
fn e2e_unknown_opcode_drops_connection() {
    run_server(ConfigurationSet::default(), |addr, _| async move {
        let mut con = TestClient::connect(addr).await;
        let frame = encode_query(0x4242, &[]);
        con.stream.write_all(&frame).await.unwrap();
        con.expect_eof().await;
    });
}

#[cfg(unix)]
#[test]
fn e2e_unix_socket_listener() {
    use tokio::net::UnixStream;
    let path = std::env::temp_dir().join(format!("bramble-e2e-{}.sock", std::process::id()));
    let path_str = path.to_str().unwrap().to_owned();
    let mut cfg = ConfigurationSet::default();
    cfg.bind = BindConfig::Unix {
        path: path_str.clone(),
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        let (signal, _) = broadcast::channel(1);
        let store: CoreHandle = Rc::new(RefCell::new(Corestore::new(
            cfg.limits(),
            cfg.compression,
            cfg.gc_ratio,
            os::unix_now(),
            usize::MAX,
        )));
        let mut listener = Listener::bind(&cfg, store.clone(), signal.clone())
            .await
            .unwrap();
        let server = tokio::task::spawn_local(async move {
            let _ = listener.run().await;
        });
        let mut stream = UnixStream::connect(&path_str).await.unwrap();
        stream
            .write_all(&encode_query(opcode::PING, &[]))
            .await
            .unwrap();
        let mut reply = [0u8; 5];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [1, 0, 0, 0, replcode::OK]);
        drop(signal);
        server.abort();
        let _ = std::fs::remove_file(&path_str);
    });
}
