use crate::domain::config::{FlowControlConfig, ParityConfig, SerialConfig};
use crate::domain::error::{MuxError, MuxResult};
use crate::infrastructure::logging::payload;
use crate::infrastructure::serial::link::SerialLink;
use serde::Serialize;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, BufRead, BufReader, Read, Write};
use tracing::{debug, error, info};

/// Serial device backed by the `serialport` crate
pub struct SerialPortLink {
    name: String,
    port: BufReader<Box<dyn SerialPort>>,
    /// Bytes of a line whose delimiter has not arrived yet
    pending: Vec<u8>,
    delimiter: u8,
    max_line_length: usize,
    open: bool,
}

impl SerialPortLink {
    pub fn open(config: &SerialConfig) -> MuxResult<Self> {
        let open_error = |message: String| MuxError::SerialOpen {
            port: config.port.clone(),
            source: serialport::Error::new(serialport::ErrorKind::InvalidInput, message),
        };

        let data_bits = match config.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => return Err(open_error(format!("Invalid data bits: {}", other))),
        };

        let stop_bits = match config.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => return Err(open_error(format!("Invalid stop bits: {}", other))),
        };

        let parity = match config.parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        };

        let flow_control = match config.flow_control {
            FlowControlConfig::None => serialport::FlowControl::None,
            FlowControlConfig::Software => serialport::FlowControl::Software,
            FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| MuxError::SerialOpen {
                port: config.port.clone(),
                source: e,
            })?;

        info!(
            "Serial port {} opened at {} baud (read timeout {:?})",
            config.port,
            config.baud_rate,
            config.read_timeout()
        );

        Ok(Self {
            name: config.port.clone(),
            port: BufReader::new(port),
            pending: Vec::new(),
            delimiter: config.line_delimiter,
            max_line_length: config.max_line_length.max(1),
            open: true,
        })
    }

    /// Discard everything received but not yet returned as a line.
    pub fn clear_input(&mut self) -> MuxResult<()> {
        let buffered = self.port.buffer().len();
        self.port.consume(buffered);
        self.pending.clear();
        self.port
            .get_ref()
            .clear(ClearBuffer::Input)
            .map_err(MuxError::Serial)
    }

    fn fail(&mut self, e: io::Error) -> MuxError {
        error!("Serial port {} failed: {}", self.name, e);
        self.open = false;
        MuxError::SerialIo(e)
    }
}

impl SerialLink for SerialPortLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> MuxResult<usize> {
        if !self.open {
            return Err(MuxError::SerialClosed);
        }
        let port = self.port.get_mut();
        if let Err(e) = port.write_all(data).and_then(|_| port.flush()) {
            return Err(self.fail(e));
        }
        debug!("Wrote {} to {}", payload(data), self.name);
        Ok(data.len())
    }

    fn read_line(&mut self) -> MuxResult<Vec<u8>> {
        if !self.open {
            return Err(MuxError::SerialClosed);
        }

        match read_delimited(
            &mut self.port,
            &mut self.pending,
            self.delimiter,
            self.max_line_length,
        ) {
            Ok(LineRead::Line(line)) => {
                debug!("Read {} from {}", payload(&line), self.name);
                Ok(line)
            }
            Ok(LineRead::Pending) => Ok(Vec::new()),
            Ok(LineRead::EndOfStream(rest)) => {
                info!("Serial port {} reached end of stream", self.name);
                self.open = false;
                Ok(rest)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Outcome of one line-assembly attempt
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// A delimited line, or `max_line_length` bytes without a delimiter
    Line(Vec<u8>),
    /// Timed out; received bytes stay in the pending buffer
    Pending,
    /// The reader is exhausted; carries whatever was left unterminated
    EndOfStream(Vec<u8>),
}

/// Append bytes from `reader` to `pending` until the delimiter arrives or
/// the line reaches `max_line_length`.
fn read_delimited<R: BufRead>(
    reader: &mut R,
    pending: &mut Vec<u8>,
    delimiter: u8,
    max_line_length: usize,
) -> io::Result<LineRead> {
    let room = max_line_length.saturating_sub(pending.len()) as u64;
    match reader.take(room).read_until(delimiter, pending) {
        Ok(0) if room > 0 => return Ok(LineRead::EndOfStream(std::mem::take(pending))),
        Ok(_) => {}
        Err(ref e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            return Ok(LineRead::Pending);
        }
        Err(e) => return Err(e),
    }

    let complete = pending.last() == Some(&delimiter);
    if complete || pending.len() >= max_line_length {
        return Ok(LineRead::Line(std::mem::take(pending)));
    }
    // read_until only stops short of the delimiter at end of stream
    Ok(LineRead::EndOfStream(std::mem::take(pending)))
}

/// One entry of `sermux ports`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSummary {
    pub name: String,
    pub kind: String,
}

/// Serial devices currently present on this machine
pub fn list_ports() -> MuxResult<Vec<PortSummary>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| PortSummary {
            kind: match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => match usb.product {
                    Some(product) => format!("usb ({})", product),
                    None => format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                },
                serialport::SerialPortType::PciPort => "pci".to_string(),
                serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            },
            name: p.port_name,
        })
        .collect())
}
