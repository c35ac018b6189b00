use crate::domain::error::{MuxError, MuxResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Device initialization string sent right after the serial link opens.
pub const DEFAULT_HANDSHAKE: &str = "#43-52\r";

/// Sermux configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Network listener configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Serial device configuration
    #[serde(default)]
    pub serial: SerialConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening endpoint and per-connection limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_tcp_port")]
    pub port: u16,
    /// Upper bound on the readiness poll per cycle
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Maximum bytes taken from one client per read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Cap on queued messages per client; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pending_messages: Option<usize>,
}

/// Serial device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default)]
    pub flow_control: FlowControlConfig,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Byte terminating one serial line
    #[serde(default = "default_line_delimiter")]
    pub line_delimiter: u8,
    /// Incomplete lines longer than this are flushed as they are
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Sent once after opening the link; empty disables it
    #[serde(default = "default_handshake")]
    pub handshake: String,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControlConfig {
    #[default]
    None,
    Hardware,
    Software,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_tcp_port() -> u16 {
    54321
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_read_chunk_size() -> usize {
    1024
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_read_timeout() -> u64 {
    50
}

fn default_line_delimiter() -> u8 {
    b'\r'
}

fn default_max_line_length() -> usize {
    4096
}

fn default_handshake() -> String {
    DEFAULT_HANDSHAKE.to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_tcp_port(),
            poll_timeout_ms: default_poll_timeout(),
            read_chunk_size: default_read_chunk_size(),
            max_pending_messages: None,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: ParityConfig::default(),
            flow_control: FlowControlConfig::default(),
            read_timeout_ms: default_read_timeout(),
            line_delimiter: default_line_delimiter(),
            max_line_length: default_max_line_length(),
            handshake: default_handshake(),
        }
    }
}

impl NetworkConfig {
    /// `host:port` string handed to the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl MuxConfig {
    /// Reject values the gateway cannot run with.
    pub fn validate(&self) -> MuxResult<()> {
        let invalid = |message: String| Err(MuxError::Config { message });

        if self.network.read_chunk_size == 0 {
            return invalid("network.read_chunk_size must be greater than zero".to_string());
        }
        if self.network.max_pending_messages == Some(0) {
            return invalid("network.max_pending_messages must be greater than zero".to_string());
        }
        if self.serial.port.trim().is_empty() {
            return invalid("serial.port must not be empty".to_string());
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be greater than zero".to_string());
        }
        if !(5..=8).contains(&self.serial.data_bits) {
            return invalid(format!("Invalid data bits: {}", self.serial.data_bits));
        }
        if !(1..=2).contains(&self.serial.stop_bits) {
            return invalid(format!("Invalid stop bits: {}", self.serial.stop_bits));
        }
        if self.serial.max_line_length == 0 {
            return invalid("serial.max_line_length must be greater than zero".to_string());
        }
        Ok(())
    }
}
