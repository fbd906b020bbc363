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

//! # Database networking
//!
//! One listener (TCP or unix socket), one task per connection, one cron
//! task -- all on a single thread via `spawn_local`, which is what makes
//! handing every task an `Rc` of the engine sound. Nothing here ever
//! holds an engine borrow across an await point

pub mod connection;

use crate::config::{BindConfig, ConfigurationSet};
use crate::corestore::{CoreHandle, Corestore};
use crate::services;
use crate::util::error::{BrambleResult, Error};
use crate::util::os;
use crate::IoResult;
use connection::ConnectionHandler;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time;

/// A marker for the stream types a [`connection::Connection`] may wrap
pub trait BufferedSocketStream: AsyncReadExt + AsyncWriteExt + Unpin {}

impl BufferedSocketStream for tokio::net::TcpStream {}
#[cfg(unix)]
impl BufferedSocketStream for tokio::net::UnixStream {}

/// A peeked termination flag over the shutdown broadcast. Once the signal
/// has been observed (or every sender is gone) the flag stays set
pub struct Terminator {
    terminated: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Self {
            terminated: false,
            signal,
        }
    }
    pub const fn is_termination_signal(&self) -> bool {
        self.terminated
    }
    pub async fn receive_signal(&mut self) {
        // an Err means every sender was dropped, which is just as final
        let _ = self.signal.recv().await;
        self.terminated = true;
    }
}

/// A backoff implementation that is meant to be used in accept loops
pub(self) struct NetBackoff {
    c: Cell<u8>,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    pub const fn new() -> Self {
        Self { c: Cell::new(1) }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        time::sleep(Duration::from_secs(self.c.get() as _)).await;
        self.c.set(self.c.get() << 1);
    }
    /// Should we give up on the socket?
    pub fn should_disconnect(&self) -> bool {
        self.c.get() > Self::MAX_BACKOFF
    }
}

/// The bound server socket
pub enum ServerSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// The accept loop and everything a new session needs
pub struct Listener {
    store: CoreHandle,
    sock: ServerSocket,
    climit: Arc<Semaphore>,
    signal: broadcast::Sender<()>,
    // we drop our `Sender` clone handed to each session when it ends; once
    // every clone is gone the `Receiver` unblocks and shutdown completes
    terminate_tx: mpsc::Sender<()>,
    terminate_rx: mpsc::Receiver<()>,
}

impl Listener {
    /// Bind per the configuration: the unix socket path wins when set,
    /// otherwise TCP on `address:port`
    pub async fn bind(
        cfg: &ConfigurationSet,
        store: CoreHandle,
        signal: broadcast::Sender<()>,
    ) -> BrambleResult<Self> {
        let sock = match &cfg.bind {
            #[cfg(unix)]
            BindConfig::Unix { path } => {
                use std::fs;
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::remove_file(path);
                let listener = UnixListener::bind(path)
                    .map_err(|e| Error::ioerror_extra(e, format!("binding to socket {path}")))?;
                fs::set_permissions(path, fs::Permissions::from_mode(0o777))
                    .map_err(|e| Error::ioerror_extra(e, format!("chmodding socket {path}")))?;
                ServerSocket::Unix(listener)
            }
            #[cfg(not(unix))]
            BindConfig::Unix { path } => {
                return Err(Error::OtherError(format!(
                    "unix socket {path} requested on a non-unix platform"
                )))
            }
            BindConfig::Tcp { host, port } => {
                let listener = TcpListener::bind((*host, *port))
                    .await
                    .map_err(|e| Error::ioerror_extra(e, format!("binding to port {port}")))?;
                ServerSocket::Tcp(listener)
            }
        };
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        Ok(Self {
            store,
            sock,
            climit: Arc::new(Semaphore::new(cfg.max_clients)),
            signal,
            terminate_tx,
            terminate_rx,
        })
    }

    /// The actual TCP address we bound (tests bind port 0)
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        match &self.sock {
            ServerSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ServerSocket::Unix(_) => None,
        }
    }

    /// Run the accept loop. Individual accept errors are retried under
    /// backoff; only a persistently failing socket brings the loop down
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            match &self.sock {
                ServerSocket::Tcp(_) => {
                    let stream = skip_loop_err!(self.accept_tcp().await);
                    let max_idletime = self.store.borrow().limits.max_idletime;
                    stream.set_nodelay(true).ok();
                    #[cfg(unix)]
                    {
                        use std::os::unix::io::AsRawFd;
                        os::set_tcp_keepalive(stream.as_raw_fd(), max_idletime).ok();
                    }
                    self.spawn_session(stream);
                }
                #[cfg(unix)]
                ServerSocket::Unix(_) => {
                    let stream = skip_loop_err!(self.accept_unix().await);
                    self.spawn_session(stream);
                }
            }
        }
    }

    async fn accept_tcp(&self) -> IoResult<tokio::net::TcpStream> {
        let ServerSocket::Tcp(listener) = &self.sock else {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "socket type changed underfoot"));
        };
        let backoff = NetBackoff::new();
        loop {
            match listener.accept().await {
                // we don't need the peer address
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        return Err(e);
                    }
                }
            }
            backoff.spin().await;
        }
    }

    #[cfg(unix)]
    async fn accept_unix(&self) -> IoResult<tokio::net::UnixStream> {
        let ServerSocket::Unix(listener) = &self.sock else {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "socket type changed underfoot"));
        };
        let backoff = NetBackoff::new();
        loop {
            match listener.accept().await {
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        return Err(e);
                    }
                }
            }
            backoff.spin().await;
        }
    }

    /// Hand an accepted stream its session task, or drop it on the floor
    /// (with a warning, without a reply) when the client cap is reached
    fn spawn_session<C: BufferedSocketStream + 'static>(&self, stream: C) {
        let permit = match self.climit.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let store = self.store.borrow();
                log::warn!(
                    "Dropping connection, current clients = {}, max = {}.",
                    store.stats.client_count,
                    store.limits.max_clients
                );
                return;
            }
        };
        let mut chandle = ConnectionHandler::new(
            self.store.clone(),
            stream,
            permit,
            Terminator::new(self.signal.subscribe()),
            self.terminate_tx.clone(),
        );
        tokio::task::spawn_local(async move {
            if let Err(e) = chandle.run().await {
                log::debug!("Session ended with error: {}", e);
            }
        });
    }

    /// Signal nothing more will be accepted and wait for every live
    /// session to drain
    pub async fn finish_with_termsig(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

#[cfg(unix)]
mod termsig {
    use core::{future::Future, pin::Pin, task::Context, task::Poll};
    use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};
    /// Object to bind to unix-specific signals
    pub struct UnixTerminationSignal {
        sigterm: Signal,
    }

    impl UnixTerminationSignal {
        pub fn init() -> Result<Self, String> {
            let sigterm = fnsignal(SignalKind::terminate())
                .map_err(|e| format!("Failed to bind to signal with: {}", e))?;
            Ok(Self { sigterm })
        }
    }

    impl Future for UnixTerminationSignal {
        type Output = Option<()>;
        fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
            self.sigterm.poll_recv(ctx)
        }
    }
}

/// Start the server and park until a termination signal arrives, then wind
/// everything down gracefully. Returns the engine so the caller can log a
/// parting summary
pub async fn run(cfg: ConfigurationSet) -> BrambleResult<CoreHandle> {
    let (signal, _) = broadcast::channel(1);
    let now = os::unix_now();
    let store: CoreHandle = Rc::new(std::cell::RefCell::new(Corestore::new(
        cfg.limits(),
        cfg.compression,
        cfg.gc_ratio,
        now,
        os::available_memory(),
    )));

    let cron_handle = tokio::task::spawn_local(services::cron::cron_scheduler(
        store.clone(),
        cfg.cron_period,
        Terminator::new(signal.subscribe()),
    ));

    let mut server = Listener::bind(&cfg, store.clone(), signal.clone()).await?;
    log::info!("Server started on {}", cfg.bind.description());

    let ctrlc = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let sigterm = termsig::UnixTerminationSignal::init().map_err(Error::OtherError)?;
        tokio::select! {
            _ = server.run() => {},
            _ = ctrlc => {},
            _ = sigterm => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = server.run() => {},
            _ = ctrlc => {}
        }
    }

    log::info!("Signalling all workers to shut down");
    drop(signal);
    server.finish_with_termsig().await;
    let _ = cron_handle.await;

    if let BindConfig::Unix { path } = &cfg.bind {
        if let Err(e) = std::fs::remove_file(path) {
            log::error!("Shutdown failure: failed to remove socket file: {}", e);
        }
    }
    Ok(store)
}
