use crate::core::connection::{Connection, ConnectionId, ReadOutcome, SendOutcome};
use crate::domain::config::NetworkConfig;
use crate::domain::error::{MuxError, MuxResult};
use crate::infrastructure::logging::payload;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

const LISTENER: Token = Token(0);
const EVENT_CAPACITY: usize = 256;

/// Tuning knobs for the multiplexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplexerOptions {
    /// Maximum bytes taken from one client per read
    pub read_chunk_size: usize,
    /// Cap on each client's output buffer; `None` keeps it unbounded
    pub max_pending_messages: Option<usize>,
}

impl Default for MultiplexerOptions {
    fn default() -> Self {
        Self {
            read_chunk_size: 1024,
            max_pending_messages: None,
        }
    }
}

impl From<&NetworkConfig> for MultiplexerOptions {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            read_chunk_size: config.read_chunk_size.max(1),
            max_pending_messages: config.max_pending_messages,
        }
    }
}

/// What a poll token refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Listener,
    Client(ConnectionId),
}

impl Endpoint {
    fn from_token(token: Token) -> Self {
        if token == LISTENER {
            Endpoint::Listener
        } else {
            Endpoint::Client(ConnectionId(token.0))
        }
    }
}

/// Readiness reported for one endpoint in the current cycle
#[derive(Debug, Clone, Copy)]
struct Readiness {
    endpoint: Endpoint,
    readable: bool,
    writable: bool,
    error: bool,
}

/// Why a connection was dropped
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    ReadError(io::Error),
    WriteError(io::Error),
    Exceptional(Option<io::Error>),
    Registration(io::Error),
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "closed by peer"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::WriteError(e) => write!(f, "write error: {}", e),
            CloseReason::Exceptional(Some(e)) => write!(f, "socket error: {}", e),
            CloseReason::Exceptional(None) => write!(f, "socket error"),
            CloseReason::Registration(e) => write!(f, "poller registration failed: {}", e),
            CloseReason::Shutdown => write!(f, "service shutdown"),
        }
    }
}

/// Work done by a single `cycle` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accepted: usize,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub closed: usize,
    pub fanned_out: usize,
}

/// Lifetime counters of a multiplexer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiplexerStats {
    pub local_addr: Option<SocketAddr>,
    pub live_connections: usize,
    pub total_accepted: u64,
    pub total_closed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub messages_dropped: u64,
}

/// Single-threaded readiness multiplexer over one listener and its clients.
///
/// Bytes read from any client land in the inbound queue; messages pushed with
/// [`enqueue_outbound`](Self::enqueue_outbound) are copied into every live
/// client's output buffer at the start of the next [`cycle`](Self::cycle).
pub struct ConnectionMultiplexer {
    poll: Poll,
    events: Events,
    listener: Option<TcpListener>,
    /// Listener readiness from an edge that has not been accepted down to `WouldBlock`
    listener_readable: bool,
    local_addr: SocketAddr,
    connections: BTreeMap<ConnectionId, Connection>,
    next_id: usize,
    inbound: VecDeque<Vec<u8>>,
    outbound: VecDeque<Vec<u8>>,
    read_buf: Vec<u8>,
    options: MultiplexerOptions,
    stats: MultiplexerStats,
}

impl ConnectionMultiplexer {
    /// Bind and listen on `bind_addr` with default options.
    pub fn start(bind_addr: &str) -> MuxResult<Self> {
        Self::start_with_options(bind_addr, MultiplexerOptions::default())
    }

    pub fn start_with_options(bind_addr: &str, options: MultiplexerOptions) -> MuxResult<Self> {
        let bind_error = |source: io::Error| MuxError::Bind {
            addr: bind_addr.to_string(),
            source,
        };

        let addr = bind_addr
            .to_socket_addrs()
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "address resolved to nothing",
                ))
            })?;

        let std_listener = std::net::TcpListener::bind(addr).map_err(|e| MuxError::bind(addr, e))?;
        std_listener
            .set_nonblocking(true)
            .map_err(|e| MuxError::bind(addr, e))?;
        let local_addr = std_listener
            .local_addr()
            .map_err(|e| MuxError::bind(addr, e))?;

        let mut listener = TcpListener::from_std(std_listener);
        let poll = Poll::new().map_err(MuxError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(MuxError::Poll)?;

        info!("Listening on {}", local_addr);

        let read_buf = vec![0u8; options.read_chunk_size.max(1)];
        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            listener: Some(listener),
            listener_readable: false,
            local_addr,
            connections: BTreeMap::new(),
            next_id: 1,
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            read_buf,
            options,
            stats: MultiplexerStats {
                local_addr: Some(local_addr),
                ..MultiplexerStats::default()
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True until [`shutdown`](Self::shutdown) deregisters the listener.
    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// Queue a message for broadcast to every client live at the next cycle.
    pub fn enqueue_outbound(&mut self, message: impl Into<Vec<u8>>) {
        self.outbound.push_back(message.into());
    }

    /// Take every message received from clients since the last call.
    pub fn drain_inbound(&mut self) -> Vec<Vec<u8>> {
        self.inbound.drain(..).collect()
    }

    /// Messages enqueued but not yet fanned out
    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Live connections, oldest first
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn pending_messages(&self, id: ConnectionId) -> Option<usize> {
        self.connections.get(&id).map(Connection::pending_messages)
    }

    /// Whether write readiness is currently being polled for `id`
    pub fn is_write_eligible(&self, id: ConnectionId) -> bool {
        self.connections
            .get(&id)
            .map(|c| c.write_interest)
            .unwrap_or(false)
    }

    pub fn peer_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&id).map(Connection::peer)
    }

    pub fn stats(&self) -> MultiplexerStats {
        MultiplexerStats {
            live_connections: self.connections.len(),
            ..self.stats.clone()
        }
    }

    /// Run one fan-out / poll / dispatch iteration.
    ///
    /// Blocks for at most `timeout` inside the readiness poll, and not at all
    /// when readiness from an earlier cycle is still unconsumed. Connection
    /// failures are absorbed here; only a failing poll is returned.
    pub fn cycle(&mut self, timeout: Duration) -> MuxResult<CycleReport> {
        let mut report = CycleReport::default();
        if !self.is_open() {
            return Ok(report);
        }

        report.fanned_out = self.fan_out();

        let timeout = if self.has_cached_readiness() {
            Duration::ZERO
        } else {
            timeout
        };

        if let Err(e) = self.poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                debug!("Poll interrupted, treating as empty");
                return Ok(report);
            }
            return Err(MuxError::Poll(e));
        }

        let ready: Vec<Readiness> = self
            .events
            .iter()
            .map(|event| Readiness {
                endpoint: Endpoint::from_token(event.token()),
                readable: event.is_readable() || event.is_read_closed(),
                writable: event.is_writable(),
                error: event.is_error(),
            })
            .collect();

        let mut exceptional = Vec::new();
        for r in &ready {
            match r.endpoint {
                Endpoint::Listener => {
                    if r.error {
                        if let Some(Ok(Some(e))) = self.listener.as_ref().map(|l| l.take_error()) {
                            warn!("Listener reported error: {}", e);
                        }
                    }
                    self.listener_readable |= r.readable;
                }
                Endpoint::Client(id) => {
                    if let Some(conn) = self.connections.get_mut(&id) {
                        conn.readable |= r.readable;
                        conn.writable |= r.writable;
                    }
                    if r.error {
                        exceptional.push(id);
                    }
                }
            }
        }

        if self.listener_readable {
            report.accepted = self.accept_pending();
        }

        report.messages_received = self.service_reads(&mut report.closed);
        report.messages_sent = self.service_writes(&mut report.closed);

        for id in exceptional {
            let err = self.connections.get(&id).and_then(Connection::take_error);
            if self.close_connection(id, CloseReason::Exceptional(err)) {
                report.closed += 1;
            }
        }

        Ok(report)
    }

    /// Close the listener and every client outright. Pending output is discarded.
    pub fn shutdown(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };
        if let Err(e) = self.poll.registry().deregister(&mut listener) {
            debug!("Failed to deregister listener: {}", e);
        }
        drop(listener);
        self.listener_readable = false;

        for id in self.connection_ids() {
            self.close_connection(id, CloseReason::Shutdown);
        }
        self.outbound.clear();
        info!("Stopped listening on {}", self.local_addr);
    }

    /// Copy every outbound message into each live client's buffer.
    fn fan_out(&mut self) -> usize {
        if self.outbound.is_empty() {
            return 0;
        }

        let mut count = 0;
        while let Some(message) = self.outbound.pop_front() {
            debug!(
                "Broadcasting {} to {} client(s)",
                payload(&message),
                self.connections.len()
            );
            for conn in self.connections.values_mut() {
                let dropped = conn.queue_message(message.clone(), self.options.max_pending_messages);
                if dropped > 0 {
                    self.stats.messages_dropped += dropped as u64;
                    warn!(
                        "Output buffer of {} ({}) full, dropped {} oldest message(s)",
                        conn.id(),
                        conn.peer(),
                        dropped
                    );
                }
            }
            count += 1;
        }

        for id in self.connection_ids() {
            self.sync_write_interest(id);
        }
        count
    }

    fn accept_pending(&mut self) -> usize {
        let mut accepted = 0;
        loop {
            let Some(listener) = self.listener.as_ref() else {
                break;
            };
            match listener.accept() {
                Ok((mut stream, peer)) => {
                    let id = ConnectionId(self.next_id);
                    self.next_id += 1;

                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, Token(id.0), Interest::READABLE)
                    {
                        warn!("Failed to register connection from {}: {}", peer, e);
                        continue;
                    }

                    info!("Accepted connection {} from {}", id, peer);
                    self.connections.insert(id, Connection::new(id, stream, peer));
                    self.stats.total_accepted += 1;
                    accepted += 1;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.listener_readable = false;
                    break;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // backlog is still pending; no new edge will report it
                    warn!("Failed to accept connection, retrying next cycle: {}", e);
                    break;
                }
            }
        }
        accepted
    }

    /// One bounded read per readable client.
    fn service_reads(&mut self, closed: &mut usize) -> usize {
        let readable: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.readable)
            .map(Connection::id)
            .collect();

        let mut received = 0;
        for id in readable {
            let Some(conn) = self.connections.get_mut(&id) else {
                continue;
            };
            match conn.read_chunk(&mut self.read_buf) {
                ReadOutcome::Data(data) => {
                    debug!("Received {} from {} ({})", payload(&data), id, conn.peer());
                    self.stats.bytes_received += data.len() as u64;
                    self.inbound.push_back(data);
                    received += 1;
                }
                ReadOutcome::WouldBlock => conn.readable = false,
                ReadOutcome::Closed => {
                    if self.close_connection(id, CloseReason::PeerClosed) {
                        *closed += 1;
                    }
                }
                ReadOutcome::Failed(e) => {
                    if self.close_connection(id, CloseReason::ReadError(e)) {
                        *closed += 1;
                    }
                }
            }
        }
        received
    }

    /// One message per write-ready client with pending output.
    fn service_writes(&mut self, closed: &mut usize) -> usize {
        let writable: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.writable && c.write_interest)
            .map(Connection::id)
            .collect();

        let mut sent = 0;
        for id in writable {
            let Some(conn) = self.connections.get_mut(&id) else {
                continue;
            };
            match conn.send_next() {
                SendOutcome::Sent(n) => {
                    debug!("Sent {} bytes to {} ({})", n, id, conn.peer());
                    self.stats.bytes_sent += n as u64;
                    sent += 1;
                }
                SendOutcome::Partial(n) => {
                    debug!("Sent {} bytes to {}, remainder queued", n, id);
                    self.stats.bytes_sent += n as u64;
                }
                SendOutcome::WouldBlock => conn.writable = false,
                SendOutcome::Idle => {}
                SendOutcome::Failed(e) => {
                    if self.close_connection(id, CloseReason::WriteError(e)) {
                        *closed += 1;
                    }
                    continue;
                }
            }
            self.sync_write_interest(id);
        }
        sent
    }

    /// Register write interest exactly while the output buffer is non-empty.
    fn sync_write_interest(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        let wants_write = conn.has_pending_output();
        if wants_write == conn.write_interest {
            return;
        }

        let interest = if wants_write {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        let result = self
            .poll
            .registry()
            .reregister(conn.stream_mut(), Token(id.0), interest);
        match result {
            Ok(()) => conn.write_interest = wants_write,
            Err(e) => {
                self.close_connection(id, CloseReason::Registration(e));
            }
        }
    }

    fn has_cached_readiness(&self) -> bool {
        self.listener_readable
            || self
                .connections
                .values()
                .any(|c| c.readable || (c.writable && c.write_interest))
    }

    /// Deregister and drop a client. Returns false if it was already gone.
    fn close_connection(&mut self, id: ConnectionId, reason: CloseReason) -> bool {
        let Some(mut conn) = self.connections.remove(&id) else {
            return false;
        };
        if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
            debug!("Failed to deregister {}: {}", id, e);
        }

        let summary = format!(
            "{} after {:?} ({} bytes in, {} bytes out), {} pending message(s) discarded",
            reason,
            conn.connected_at().elapsed().unwrap_or_default(),
            conn.bytes_received(),
            conn.bytes_sent(),
            conn.pending_messages()
        );
        match reason {
            CloseReason::PeerClosed | CloseReason::Shutdown => {
                info!("Removed connection {} ({}): {}", id, conn.peer(), summary)
            }
            _ => warn!("Removed connection {} ({}): {}", id, conn.peer(), summary),
        }
        self.stats.total_closed += 1;
        true
    }
}

impl fmt::Debug for ConnectionMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMultiplexer")
            .field("local_addr", &self.local_addr)
            .field("open", &self.is_open())
            .field("connections", &self.connections.len())
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .finish()
    }
}

impl Drop for ConnectionMultiplexer {
    fn drop(&mut self) {
        if self.is_open() {
            debug!("Multiplexer on {} dropped while open", self.local_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(10);

    fn cycle_until<F>(mux: &mut ConnectionMultiplexer, mut done: F)
    where
        F: FnMut(&mut ConnectionMultiplexer) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(mux) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            mux.cycle(TICK).unwrap();
        }
    }

    fn connect(mux: &mut ConnectionMultiplexer) -> TcpStream {
        let before = mux.connection_count();
        let client = TcpStream::connect(mux.local_addr()).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        cycle_until(mux, |m| m.connection_count() > before);
        client
    }

    #[test]
    fn test_start_on_ephemeral_port() {
        let mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        assert!(mux.is_open());
        assert_ne!(mux.local_addr().port(), 0);
        assert_eq!(mux.connection_count(), 0);
    }

    #[test]
    fn test_start_rejects_unresolvable_address() {
        let result = ConnectionMultiplexer::start("not an address");
        assert!(matches!(result, Err(MuxError::Bind { .. })));
    }

    #[test]
    fn test_idle_cycle_respects_timeout() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let started = Instant::now();
        let report = mux.cycle(Duration::from_millis(20)).unwrap();
        assert_eq!(report, CycleReport::default());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_accepts_in_acceptance_order() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let _a = connect(&mut mux);
        let _b = connect(&mut mux);

        let ids = mux.connection_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
        assert_eq!(mux.stats().total_accepted, 2);
    }

    #[test]
    fn test_inbound_bytes_are_queued_verbatim() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let mut client = connect(&mut mux);

        client.write_all(b"PING").unwrap();
        let mut received = Vec::new();
        cycle_until(&mut mux, |m| {
            received.extend(m.drain_inbound().concat());
            received.len() >= 4
        });
        assert_eq!(received, b"PING");
        assert!(mux.drain_inbound().is_empty());
    }

    #[test]
    fn test_reads_are_bounded_by_chunk_size() {
        let options = MultiplexerOptions {
            read_chunk_size: 4,
            max_pending_messages: None,
        };
        let mut mux = ConnectionMultiplexer::start_with_options("127.0.0.1:0", options).unwrap();
        let mut client = connect(&mut mux);

        client.write_all(b"0123456789").unwrap();
        let mut chunks = Vec::new();
        cycle_until(&mut mux, |m| {
            chunks.extend(m.drain_inbound());
            chunks.iter().map(Vec::len).sum::<usize>() >= 10
        });
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), b"0123456789");
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let mut a = connect(&mut mux);
        let mut b = connect(&mut mux);

        mux.enqueue_outbound(b"PONG\r".to_vec());
        mux.cycle(TICK).unwrap();
        let ids = mux.connection_ids();
        cycle_until(&mut mux, |m| {
            ids.iter().all(|id| m.pending_messages(*id) == Some(0))
        });

        for client in [&mut a, &mut b] {
            let mut buf = [0u8; 5];
            client.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"PONG\r");
        }
    }

    #[test]
    fn test_write_interest_tracks_output_buffer() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let _client = connect(&mut mux);
        let id = mux.connection_ids()[0];
        assert!(!mux.is_write_eligible(id));

        mux.enqueue_outbound(b"a\r".to_vec());
        mux.enqueue_outbound(b"b\r".to_vec());
        mux.cycle(Duration::ZERO).unwrap();
        cycle_until(&mut mux, |m| m.pending_messages(id) == Some(0));
        assert!(!mux.is_write_eligible(id));

        let report = mux.cycle(TICK).unwrap();
        assert_eq!(report.messages_sent, 0);
        assert!(!mux.is_write_eligible(id));
    }

    #[test]
    fn test_peer_close_removes_connection() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let client = connect(&mut mux);
        let _other = connect(&mut mux);

        drop(client);
        cycle_until(&mut mux, |m| m.connection_count() == 1);

        mux.enqueue_outbound(b"after\r".to_vec());
        mux.cycle(TICK).unwrap();
        assert_eq!(mux.stats().total_closed, 1);
    }

    #[test]
    fn test_pending_cap_limits_buffer() {
        let options = MultiplexerOptions {
            read_chunk_size: 1024,
            max_pending_messages: Some(2),
        };
        let mut mux = ConnectionMultiplexer::start_with_options("127.0.0.1:0", options).unwrap();
        let _client = connect(&mut mux);
        let id = mux.connection_ids()[0];

        for i in 0..5u8 {
            mux.enqueue_outbound(vec![i]);
        }
        mux.fan_out();
        assert_eq!(mux.pending_messages(id), Some(2));
        assert_eq!(mux.stats().messages_dropped, 3);
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let mut client = connect(&mut mux);

        mux.shutdown();
        assert!(!mux.is_open());
        assert_eq!(mux.connection_count(), 0);
        assert_eq!(mux.cycle(TICK).unwrap(), CycleReport::default());

        let mut buf = [0u8; 1];
        match client.read(&mut buf) {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("unexpected {} bytes after shutdown", n),
        }
    }

    /// Poll directly until the listener edge is reported, without accepting.
    fn swallow_listener_edge(mux: &mut ConnectionMultiplexer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(Instant::now() < deadline, "listener never became readable");
            mux.poll.poll(&mut mux.events, Some(TICK)).unwrap();
            if mux.events.iter().any(|e| e.token() == LISTENER) {
                return;
            }
        }
    }

    #[test]
    fn test_interrupted_accept_burst_resumes_without_new_edge() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let _clients: Vec<TcpStream> = (0..3)
            .map(|_| TcpStream::connect(mux.local_addr()).unwrap())
            .collect();

        // The edge is consumed but the burst ends early, as after EMFILE
        swallow_listener_edge(&mut mux);
        mux.listener_readable = true;
        assert!(mux.has_cached_readiness());

        let mut accepted = 0;
        let deadline = Instant::now() + Duration::from_secs(5);
        while accepted < 3 {
            assert!(Instant::now() < deadline, "backlogged connections never accepted");
            accepted += mux.cycle(TICK).unwrap().accepted;
        }
        assert_eq!(mux.connection_count(), 3);
        assert!(!mux.listener_readable);
    }

    #[test]
    fn test_listener_readiness_cleared_once_backlog_drained() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let _client = connect(&mut mux);
        assert!(!mux.listener_readable);

        let started = Instant::now();
        mux.cycle(Duration::from_millis(50)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_peer_addr_matches_client() {
        let mut mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let client = connect(&mut mux);
        let id = mux.connection_ids()[0];

        assert_eq!(mux.peer_addr(id), Some(client.local_addr().unwrap()));
        mux.shutdown();
        assert_eq!(mux.peer_addr(id), None);
    }

    #[test]
    fn test_endpoint_from_token() {
        assert_eq!(Endpoint::from_token(LISTENER), Endpoint::Listener);
        assert_eq!(
            Endpoint::from_token(Token(3)),
            Endpoint::Client(ConnectionId(3))
        );
    }
}
