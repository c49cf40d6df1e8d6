//! TCP Server
//!
//! Accepts connections and runs each on its own thread.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use super::Connection;
use crate::commands::{CommandTable, Session};
use crate::config::Config;
use crate::db::Databases;
use crate::error::{EmberError, Result};
use crate::protocol::{write_reply, Reply, ReplyError};

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for EmberKV
pub struct Server {
    config: Config,
    databases: Arc<Databases>,
    commands: Arc<CommandTable>,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
    shutdown: Arc<AtomicBool>,
}

/// A live connection: a handle to its socket (for shutdown) and its thread
struct ActiveConnection {
    stream: TcpStream,
    thread: JoinHandle<()>,
}

impl Server {
    /// Create a new server with the given config and databases
    pub fn new(config: Config, databases: Arc<Databases>) -> Self {
        Self {
            config,
            databases,
            commands: Arc::new(CommandTable::new()),
            listener: None,
            local_addr: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address without accepting yet.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            EmberError::Network(format!("failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.local_addr = Some(addr);
        Ok(addr)
    }

    /// Address the server is bound to, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Flag that stops [`run`](Self::run) when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Start the server (blocking until shutdown is signalled)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(EmberError::Network("listener not bound".to_string())),
        };

        tracing::info!(
            "Listening on {} ({} databases, max {} connections)",
            listener.local_addr()?,
            self.databases.len(),
            self.config.max_connections
        );

        let (done_tx, done_rx) = channel::unbounded::<u64>();
        let mut active: HashMap<u64, ActiveConnection> = HashMap::new();
        let mut next_id: u64 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            for id in done_rx.try_iter() {
                if let Some(conn) = active.remove(&id) {
                    let _ = conn.thread.join();
                }
            }

            match listener.accept() {
                Ok((stream, peer)) => {
                    if active.len() >= self.config.max_connections {
                        tracing::warn!("Rejecting {}: connection limit reached", peer);
                        reject(stream);
                        continue;
                    }

                    let id = next_id;
                    next_id += 1;
                    match self.spawn_connection(id, stream, done_tx.clone()) {
                        Ok(conn) => {
                            active.insert(id, conn);
                        }
                        Err(e) => tracing::warn!("Failed to start connection for {}: {}", peer, e),
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Shutting down, closing {} connections", active.len());
        for (_, conn) in active.drain() {
            let _ = conn.stream.shutdown(Shutdown::Both);
            let _ = conn.thread.join();
        }
        Ok(())
    }

    fn spawn_connection(
        &self,
        id: u64,
        stream: TcpStream,
        done: Sender<u64>,
    ) -> Result<ActiveConnection> {
        stream.set_nonblocking(false)?;
        let handle = stream.try_clone()?;

        let session = Session::new(Arc::clone(&self.databases));
        let commands = Arc::clone(&self.commands);
        let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

        let thread = thread::Builder::new()
            .name(format!("emberkv-conn-{}", id))
            .spawn(move || {
                let result = Connection::new(stream, session, commands).and_then(|mut conn| {
                    conn.set_timeouts(read_ms, write_ms)?;
                    conn.handle()
                });
                if let Err(e) = result {
                    tracing::warn!("Connection {} ended with error: {}", id, e);
                }
                let _ = done.send(id);
            })?;

        Ok(ActiveConnection {
            stream: handle,
            thread,
        })
    }
}

/// Tell an over-limit client why it is being dropped
fn reject(mut stream: TcpStream) {
    if stream.set_nonblocking(false).is_ok() {
        let _ = write_reply(&mut stream, &Reply::Error(ReplyError::MaxClients));
    }
    let _ = stream.shutdown(Shutdown::Both);
}
