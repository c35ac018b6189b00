use crate::domain::error::{MuxError, MuxResult};

/// Blocking-with-timeout byte channel to the serial device.
///
/// Implementations report a lost device through [`is_open`](Self::is_open)
/// so the bridge stops instead of spinning on errors.
pub trait SerialLink {
    /// Human readable device name for logs
    fn name(&self) -> &str;

    /// Write all of `data`, returning the number of bytes written.
    fn write_bytes(&mut self, data: &[u8]) -> MuxResult<usize>;

    /// Bytes up to and including the line delimiter, or an empty vector
    /// when the read timeout expires first.
    fn read_line(&mut self) -> MuxResult<Vec<u8>>;

    fn is_open(&self) -> bool;

    /// Write ASCII text such as device commands.
    fn write_str(&mut self, text: &str) -> MuxResult<usize> {
        if !text.is_ascii() {
            return Err(MuxError::InvalidInput(format!(
                "Serial commands must be ASCII: {:?}",
                text
            )));
        }
        self.write_bytes(text.as_bytes())
    }
}

impl<L: SerialLink + ?Sized> SerialLink for Box<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write_bytes(&mut self, data: &[u8]) -> MuxResult<usize> {
        (**self).write_bytes(data)
    }

    fn read_line(&mut self) -> MuxResult<Vec<u8>> {
        (**self).read_line()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
