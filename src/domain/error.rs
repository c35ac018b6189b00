use std::net::SocketAddr;
use thiserror::Error;

/// Sermux unified error type
///
/// Only service-level failures are represented here. Failures local to a
/// single client connection are absorbed by the multiplexer and never
/// surface as a `MuxError`.
#[derive(Error, Debug)]
pub enum MuxError {
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Readiness poll failed: {0}")]
    Poll(#[source] std::io::Error),

    #[error("Failed to open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Serial I/O error: {0}")]
    SerialIo(#[source] std::io::Error),

    #[error("Serial link closed")]
    SerialClosed,

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Bridge task failed: {0}")]
    Task(String),
}

impl MuxError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }

    /// True for errors that mean the serial device is gone.
    pub fn is_serial(&self) -> bool {
        matches!(
            self,
            Self::SerialOpen { .. } | Self::Serial(_) | Self::SerialIo(_) | Self::SerialClosed
        )
    }
}

pub type MuxResult<T> = Result<T, MuxError>;
