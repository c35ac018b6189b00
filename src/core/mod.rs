// Core module - Connection multiplexing and the serial bridge
pub mod bridge;
pub mod connection;
pub mod multiplexer;

pub use bridge::{Bridge, BridgeConfig, BridgeStats};
pub use connection::{Connection, ConnectionId};
pub use multiplexer::{ConnectionMultiplexer, CycleReport, MultiplexerOptions, MultiplexerStats};
