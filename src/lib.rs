//! Sermux Library
//!
//! Shares one serial device between any number of TCP clients: every line
//! read from the device is broadcast to all clients, and every message from
//! a client is written to the device.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use core::{Bridge, BridgeConfig, ConnectionId, ConnectionMultiplexer, MultiplexerOptions};
pub use domain::config::MuxConfig;
pub use domain::error::{MuxError, MuxResult};
pub use infrastructure::serial::{MockSerialLink, SerialLink, SerialPortLink};
