/*
 * Created on Sat Apr 15 2023
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

//! # The client session
//!
//! A session cycles through three states: read the 4-byte frame size, read
//! the body, write the reply. The runtime hides the partial-I/O bookkeeping
//! inside `read_exact`/`write_all`; what remains of the state machine is
//! the validation between the states. Malformed input never gets a reply --
//! the session just ends

use super::{BufferedSocketStream, Terminator};
use crate::corestore::CoreHandle;
use crate::protocol::{
    responses::{Response, RAW_ERR_FRAME},
    ParseError, Parser, Query, MIN_REQUEST_SIZE, SIZE_PREFIX_LEN,
};
use crate::queryengine::{self, Reply};
use crate::IoResult;
use bytes::BytesMut;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::time;

/// What one read cycle produced
enum FrameResult {
    Query(Query),
    /// clean EOF between frames, or a peer that vanished mid-frame
    Disconnected,
    /// framing violation; the logged numbers are all we ever learn
    Malformed { size: u32, reason: &'static str },
}

/// A buffered connection to a client
pub struct Connection<C> {
    stream: BufWriter<C>,
}

impl<C: BufferedSocketStream> Connection<C> {
    pub fn new(stream: C) -> Self {
        Self {
            stream: BufWriter::new(stream),
        }
    }

    /// Read one complete request frame
    async fn read_frame(&mut self, max_request_size: usize) -> IoResult<FrameResult> {
        let mut size_raw = [0u8; SIZE_PREFIX_LEN];
        match self.stream.read_exact(&mut size_raw).await {
            Ok(_) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Ok(FrameResult::Disconnected)
            }
            Err(e) => return Err(e),
        }
        let size = u32::from_le_bytes(size_raw);
        if (size as usize) < MIN_REQUEST_SIZE || size as usize > max_request_size {
            return Ok(FrameResult::Malformed {
                size,
                reason: "size out of bounds",
            });
        }
        let mut body = BytesMut::zeroed(size as usize);
        match self.stream.read_exact(&mut body).await {
            Ok(_) => (),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Ok(FrameResult::Disconnected)
            }
            Err(e) => return Err(e),
        }
        match Parser::parse(body.freeze()) {
            Ok(query) => Ok(FrameResult::Query(query)),
            Err(ParseError::NotEnough) => Ok(FrameResult::Malformed {
                size,
                reason: "truncated argument",
            }),
            Err(ParseError::TrailingBytes) => Ok(FrameResult::Malformed {
                size,
                reason: "trailing bytes",
            }),
        }
    }

    async fn write_reply(&mut self, frame: &[u8]) -> IoResult<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }
}

/// Drives one client session to completion
pub struct ConnectionHandler<C> {
    store: CoreHandle,
    con: Connection<C>,
    terminator: Terminator,
    _term_sig_tx: mpsc::Sender<()>,
    _permit: OwnedSemaphorePermit,
}

impl<C: BufferedSocketStream> ConnectionHandler<C> {
    pub fn new(
        store: CoreHandle,
        stream: C,
        permit: OwnedSemaphorePermit,
        terminator: Terminator,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        store.borrow_mut().stats.client_count += 1;
        Self {
            store,
            con: Connection::new(stream),
            terminator,
            _term_sig_tx,
            _permit: permit,
        }
    }

    pub async fn run(&mut self) -> IoResult<()> {
        log::debug!("ConnectionHandler initialized to handle a remote client");
        let (max_request_size, max_response_size, max_idletime) = {
            let store = self.store.borrow();
            (
                store.limits.max_request_size,
                store.limits.max_response_size,
                store.limits.max_idletime,
            )
        };
        let idle_window = Duration::from_secs(max_idletime.max(1));
        while !self.terminator.is_termination_signal() {
            let frame = tokio::select! {
                frame = time::timeout(idle_window, self.con.read_frame(max_request_size)) => {
                    match frame {
                        Ok(f) => f?,
                        Err(_) => {
                            log::debug!("Client exceeded the idle window, closing.");
                            return Ok(());
                        }
                    }
                }
                _ = self.terminator.receive_signal() => return Ok(()),
            };
            match frame {
                FrameResult::Query(query) => {
                    let opc = query.opcode();
                    // execute synchronously; the engine borrow never
                    // crosses the writes below
                    let outcome = {
                        let mut store = self.store.borrow_mut();
                        queryengine::execute(&mut store, query)
                    };
                    match outcome {
                        Ok(Reply { response, close }) => {
                            let frame = match response.serialize(max_response_size) {
                                Ok(frame) => frame,
                                Err(too_large) => {
                                    log::error!(
                                        "Reply of {} bytes exceeds the response bound, sending an error instead.",
                                        too_large.0
                                    );
                                    Response::Err
                                        .serialize(max_response_size)
                                        .unwrap_or_else(|_| {
                                            bytes::Bytes::from_static(&RAW_ERR_FRAME)
                                        })
                                }
                            };
                            self.con.write_reply(&frame).await?;
                            if close {
                                return Ok(());
                            }
                        }
                        Err(_violation) => {
                            log::warn!(
                                "Malformed query (opcode {:#06x}), dropping client.",
                                opc
                            );
                            return Ok(());
                        }
                    }
                }
                FrameResult::Disconnected => return Ok(()),
                FrameResult::Malformed { size, reason } => {
                    log::warn!(
                        "Client request size {} invalid ({}), dropping client.",
                        size,
                        reason
                    );
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl<C> Drop for ConnectionHandler<C> {
    fn drop(&mut self) {
        // the permit rides back to the semaphore on its own Drop; the
        // client count is ours to settle
        let mut store = self.store.borrow_mut();
        store.stats.client_count = store.stats.client_count.saturating_sub(1);
    }
}
