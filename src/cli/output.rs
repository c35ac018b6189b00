use crate::cli::args::OutputFormat;
use crate::core::BridgeStats;
use crate::domain::config::MuxConfig;
use crate::infrastructure::serial::PortSummary;
use serde::Serialize;
use std::io;

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_config(&self, config: &MuxConfig) -> Result<(), OutputError>;
    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError>;
    fn write_bridge_stats(&self, stats: &BridgeStats) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::MuxError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), OutputError> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_config(&self, config: &MuxConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => print!("{}", toml::to_string_pretty(config)?),
            OutputFormat::Json => self.write_json(config)?,
        }
        Ok(())
    }

    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                }
                for port in ports {
                    println!("  {:<24} {}", port.name, port.kind);
                }
            }
            OutputFormat::Json => self.write_json(ports)?,
        }
        Ok(())
    }

    fn write_bridge_stats(&self, stats: &BridgeStats) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("Bridge statistics:");
                println!("  Cycles: {}", stats.cycles);
                println!(
                    "  To serial: {} messages, {} bytes",
                    stats.messages_to_serial, stats.bytes_to_serial
                );
                println!(
                    "  From serial: {} lines, {} bytes",
                    stats.lines_from_serial, stats.bytes_from_serial
                );
            }
            OutputFormat::Json => self.write_json(stats)?,
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => self.write_json(&serde_json::json!({ "message": message }))?,
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => eprintln!("Error: {}", error),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::to_string_pretty(&serde_json::json!({ "error": error }))?)
            }
        }
        Ok(())
    }
}
