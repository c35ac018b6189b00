use crate::core::multiplexer::ConnectionMultiplexer;
use crate::domain::config::MuxConfig;
use crate::domain::error::MuxResult;
use crate::infrastructure::logging::payload;
use crate::infrastructure::serial::SerialLink;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Loop settings taken from the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub poll_timeout: Duration,
    /// Sent to the device once before the loop starts; empty disables it
    pub handshake: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            handshake: crate::domain::config::DEFAULT_HANDSHAKE.to_string(),
        }
    }
}

impl From<&MuxConfig> for BridgeConfig {
    fn from(config: &MuxConfig) -> Self {
        Self {
            poll_timeout: config.network.poll_timeout(),
            handshake: config.serial.handshake.clone(),
        }
    }
}

/// Traffic counters of a bridge run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub cycles: u64,
    pub messages_to_serial: u64,
    pub bytes_to_serial: u64,
    pub lines_from_serial: u64,
    pub bytes_from_serial: u64,
}

/// Wires one serial link to a connection multiplexer.
///
/// Each step runs one multiplexer cycle, forwards every client message to the
/// device and performs exactly one line read, so a quiet device delays
/// socket work by at most its read timeout.
pub struct Bridge<L: SerialLink> {
    multiplexer: ConnectionMultiplexer,
    link: L,
    config: BridgeConfig,
    stats: BridgeStats,
}

impl<L: SerialLink> Bridge<L> {
    pub fn new(multiplexer: ConnectionMultiplexer, link: L, config: BridgeConfig) -> Self {
        Self {
            multiplexer,
            link,
            config,
            stats: BridgeStats::default(),
        }
    }

    pub fn multiplexer(&self) -> &ConnectionMultiplexer {
        &self.multiplexer
    }

    pub fn multiplexer_mut(&mut self) -> &mut ConnectionMultiplexer {
        &mut self.multiplexer
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// True while both the listener and the serial link are open.
    pub fn is_running(&self) -> bool {
        self.multiplexer.is_open() && self.link.is_open()
    }

    /// Send the device initialization string.
    pub fn handshake(&mut self) -> MuxResult<()> {
        if self.config.handshake.is_empty() {
            return Ok(());
        }
        info!("Sending handshake {:?} to {}", self.config.handshake, self.link.name());
        self.link.write_str(&self.config.handshake)?;
        Ok(())
    }

    /// One iteration: multiplexer cycle, client messages to the device,
    /// one serial line read broadcast to clients.
    pub fn step(&mut self) -> MuxResult<()> {
        self.multiplexer.cycle(self.config.poll_timeout)?;
        self.stats.cycles += 1;

        for message in self.multiplexer.drain_inbound() {
            debug!("Forwarding {} from network client to serial", payload(&message));
            let written = self.link.write_bytes(&message)?;
            self.stats.messages_to_serial += 1;
            self.stats.bytes_to_serial += written as u64;
        }

        let line = self.link.read_line()?;
        if !line.is_empty() {
            debug!("Broadcasting serial line {}", payload(&line));
            self.stats.lines_from_serial += 1;
            self.stats.bytes_from_serial += line.len() as u64;
            self.multiplexer.enqueue_outbound(line);
        }
        Ok(())
    }

    /// Handshake, then step until either end closes or `shutdown` is set.
    ///
    /// The multiplexer is shut down on every exit path.
    pub fn run(&mut self, shutdown: &AtomicBool) -> MuxResult<BridgeStats> {
        info!(
            "Bridging {} <-> {}",
            self.link.name(),
            self.multiplexer.local_addr()
        );

        let result = self.handshake().and_then(|_| self.run_loop(shutdown));
        self.multiplexer.shutdown();

        match &result {
            Ok(()) => info!("Bridge stopped: {:?}", self.stats),
            Err(e) => error!("Bridge stopped on error: {}", e),
        }
        result.map(|_| self.stats.clone())
    }

    fn run_loop(&mut self, shutdown: &AtomicBool) -> MuxResult<()> {
        while self.is_running() {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested");
                break;
            }
            self.step()?;
        }
        if !self.link.is_open() {
            warn!("Serial link {} closed", self.link.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::MuxError;
    use crate::infrastructure::serial::MockSerialLink;

    fn bridge() -> Bridge<MockSerialLink> {
        let mux = ConnectionMultiplexer::start("127.0.0.1:0").unwrap();
        let config = BridgeConfig {
            poll_timeout: Duration::from_millis(5),
            ..BridgeConfig::default()
        };
        Bridge::new(mux, MockSerialLink::new("mock"), config)
    }

    #[test]
    fn test_handshake_is_sent_first() {
        let mut bridge = bridge();
        let handle = bridge.link().handle();
        bridge.handshake().unwrap();
        assert_eq!(handle.writes(), vec![b"#43-52\r".to_vec()]);
    }

    #[test]
    fn test_empty_handshake_is_skipped() {
        let mut bridge = bridge();
        bridge.config.handshake.clear();
        bridge.handshake().unwrap();
        assert!(bridge.link().handle().writes().is_empty());
    }

    #[test]
    fn test_step_enqueues_serial_lines() {
        let mut bridge = bridge();
        bridge.link().handle().push_line(b"PONG\r".to_vec());
        bridge.step().unwrap();
        assert_eq!(bridge.stats().lines_from_serial, 1);
        assert_eq!(bridge.stats().bytes_from_serial, 5);
    }

    #[test]
    fn test_run_stops_when_link_closes() {
        let mut bridge = bridge();
        bridge.link().handle().close();
        let shutdown = AtomicBool::new(false);
        let result = bridge.run(&shutdown);
        // the handshake hits the closed link
        assert!(matches!(result, Err(MuxError::SerialClosed)));
        assert!(!bridge.multiplexer().is_open());
    }

    #[test]
    fn test_run_honours_shutdown_flag() {
        let mut bridge = bridge();
        let shutdown = AtomicBool::new(true);
        let stats = bridge.run(&shutdown).unwrap();
        assert_eq!(stats.cycles, 0);
        assert!(!bridge.multiplexer().is_open());
    }
}
