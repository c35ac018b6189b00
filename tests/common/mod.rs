#![allow(dead_code)]

use sermux::core::{Bridge, BridgeConfig, ConnectionMultiplexer};
use sermux::infrastructure::serial::{MockHandle, MockSerialLink};
use std::io::Read;
use std::net::TcpStream;
use std::time::{Duration, Instant};

pub const TICK: Duration = Duration::from_millis(10);
pub const DEADLINE: Duration = Duration::from_secs(5);

pub fn mux() -> ConnectionMultiplexer {
    ConnectionMultiplexer::start("127.0.0.1:0").expect("bind loopback listener")
}

pub fn bridge() -> (Bridge<MockSerialLink>, MockHandle) {
    bridge_with(BridgeConfig {
        poll_timeout: TICK,
        ..BridgeConfig::default()
    })
}

pub fn bridge_with(config: BridgeConfig) -> (Bridge<MockSerialLink>, MockHandle) {
    let link = MockSerialLink::new("mock").with_read_timeout(Duration::from_millis(1));
    let handle = link.handle();
    (Bridge::new(mux(), link, config), handle)
}

/// Cycle until `done` holds, panicking after [`DEADLINE`].
pub fn cycle_until<F>(mux: &mut ConnectionMultiplexer, mut done: F)
where
    F: FnMut(&mut ConnectionMultiplexer) -> bool,
{
    let deadline = Instant::now() + DEADLINE;
    while !done(mux) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        mux.cycle(TICK).expect("cycle");
    }
}

/// Step the bridge until `done` holds, panicking after [`DEADLINE`].
pub fn step_until<F>(bridge: &mut Bridge<MockSerialLink>, mut done: F)
where
    F: FnMut(&Bridge<MockSerialLink>) -> bool,
{
    let deadline = Instant::now() + DEADLINE;
    while !done(bridge) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        bridge.step().expect("step");
    }
}

/// Connect a client and cycle until the multiplexer has accepted it.
pub fn connect(mux: &mut ConnectionMultiplexer) -> TcpStream {
    let before = mux.connection_count();
    let client = TcpStream::connect(mux.local_addr()).expect("connect");
    client.set_read_timeout(Some(DEADLINE)).expect("read timeout");
    cycle_until(mux, |m| m.connection_count() > before);
    client
}

/// True once every output buffer and the outbound queue are empty.
pub fn flushed(mux: &ConnectionMultiplexer) -> bool {
    mux.pending_outbound() == 0
        && mux
            .connection_ids()
            .iter()
            .all(|id| mux.pending_messages(*id) == Some(0))
}

pub fn read_exactly(client: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    client.read_exact(&mut buf).expect("read from gateway");
    buf
}

/// Assert nothing more arrives within a short window.
pub fn assert_silent(client: &mut TcpStream) {
    client
        .set_read_timeout(Some(Duration::from_millis(50)))
        .expect("read timeout");
    let mut buf = [0u8; 64];
    match client.read(&mut buf) {
        Ok(n) => panic!("unexpected {} bytes: {:?}", n, &buf[..n]),
        Err(e) => assert!(matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        )),
    }
}
