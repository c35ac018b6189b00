use mio::net::TcpStream;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// Identifier of one accepted client. Never reused within a multiplexer,
/// so ordering by id is ordering by acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) usize);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of one bounded read attempt
#[derive(Debug)]
pub enum ReadOutcome {
    Data(Vec<u8>),
    /// Orderly close by the peer (zero-length read)
    Closed,
    WouldBlock,
    Failed(io::Error),
}

/// Result of one send attempt
#[derive(Debug)]
pub enum SendOutcome {
    /// Whole message written
    Sent(usize),
    /// Only a prefix was written; the rest stays queued
    Partial(usize),
    /// Output buffer was empty
    Idle,
    WouldBlock,
    Failed(io::Error),
}

/// One accepted client socket and its output buffer.
///
/// The buffer lives and dies with the connection, so no other structure
/// has to be kept in sync when the client goes away.
pub struct Connection {
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    connected_at: std::time::SystemTime,
    output: VecDeque<Vec<u8>>,
    /// Readiness cached from edge-triggered events, cleared on `WouldBlock`
    pub(crate) readable: bool,
    pub(crate) writable: bool,
    /// Whether write interest is currently registered with the poller
    pub(crate) write_interest: bool,
    bytes_received: u64,
    bytes_sent: u64,
}

impl Connection {
    pub fn new(id: ConnectionId, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id,
            stream,
            peer,
            connected_at: std::time::SystemTime::now(),
            output: VecDeque::new(),
            readable: false,
            writable: false,
            write_interest: false,
            bytes_received: 0,
            bytes_sent: 0,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn connected_at(&self) -> std::time::SystemTime {
        self.connected_at
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn pending_messages(&self) -> usize {
        self.output.len()
    }

    pub fn has_pending_output(&self) -> bool {
        !self.output.is_empty()
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Append a message to the output buffer. With a cap, the oldest
    /// messages are discarded to make room; returns how many were dropped.
    pub fn queue_message(&mut self, message: Vec<u8>, max_pending: Option<usize>) -> usize {
        let mut dropped = 0;
        if let Some(cap) = max_pending {
            while self.output.len() >= cap.max(1) {
                self.output.pop_front();
                dropped += 1;
            }
        }
        self.output.push_back(message);
        dropped
    }

    /// Read at most `buf.len()` bytes.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> ReadOutcome {
        loop {
            match self.stream.read(buf) {
                Ok(0) => return ReadOutcome::Closed,
                Ok(n) => {
                    self.bytes_received += n as u64;
                    return ReadOutcome::Data(buf[..n].to_vec());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return ReadOutcome::WouldBlock
                }
                Err(e) => return ReadOutcome::Failed(e),
            }
        }
    }

    /// Send the message at the head of the output buffer.
    pub fn send_next(&mut self) -> SendOutcome {
        let Some(message) = self.output.front_mut() else {
            return SendOutcome::Idle;
        };

        loop {
            match self.stream.write(message) {
                Ok(0) => {
                    return SendOutcome::Failed(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer accepted zero bytes",
                    ))
                }
                Ok(n) => {
                    self.bytes_sent += n as u64;
                    if n < message.len() {
                        message.drain(..n);
                        return SendOutcome::Partial(n);
                    }
                    self.output.pop_front();
                    return SendOutcome::Sent(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return SendOutcome::WouldBlock
                }
                Err(e) => return SendOutcome::Failed(e),
            }
        }
    }

    /// Pending socket error, if any (`SO_ERROR`)
    pub fn take_error(&self) -> Option<io::Error> {
        self.stream.take_error().ok().flatten()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("pending", &self.output.len())
            .field("write_interest", &self.write_interest)
            .finish()
    }
}
