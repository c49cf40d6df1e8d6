//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::{CommandTable, Session};
use crate::error::{EmberError, Result};
use crate::protocol::{encode_reply, read_command, Command, Reply, ReplyError};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Selected database and shared handles
    session: Session,

    commands: Arc<CommandTable>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and disables Nagle's algorithm
    pub fn new(stream: TcpStream, session: Session, commands: Arc<CommandTable>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            session,
            commands,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves the timeout unset)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads commands in a loop and sends replies. Returns when the client
    /// disconnects, idles past the read timeout or sends a malformed request.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(EmberError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(EmberError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(EmberError::Protocol(msg)) => {
                    tracing::warn!("Protocol error from {}: {}", self.peer_addr, msg);
                    let _ = self.send_reply(&ReplyError::Protocol(msg).into());
                    let _ = self.writer.flush();
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);

            let reply = self.execute_command(&command);

            if let Err(e) = self.send_reply(&reply) {
                if let EmberError::Io(ref io_err) = e {
                    if is_disconnect(io_err.kind()) || io_err.kind() == ErrorKind::BrokenPipe {
                        tracing::debug!(
                            "Client {} disconnected before reply could be sent: {}",
                            self.peer_addr,
                            e
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Run a command. A store failure leaves no consistent reply to give and
    /// aborts the process.
    fn execute_command(&mut self, command: &Command) -> Reply {
        match self.commands.execute(command, &mut self.session) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    "Storage failure executing {} for {}: {}",
                    command.name_lowercase(),
                    self.peer_addr,
                    e
                );
                std::process::abort();
            }
        }
    }

    /// Buffer a reply; flush once no pipelined request is waiting
    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        self.writer.write_all(&encode_reply(reply))?;
        if self.reader.buffer().is_empty() {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Index of the currently selected database
    pub fn selected_db(&self) -> usize {
        self.session.selected()
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
