//! An in-memory serial link.
//!
//! Lines queued through a [`MockHandle`] are returned by `read_line` one per
//! call, and everything written to the link is recorded for inspection.
//! Useful for exercising the bridge without a physical device.

use crate::domain::error::{MuxError, MuxResult};
use crate::infrastructure::serial::link::SerialLink;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    lines: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    closed: bool,
}

/// Shared control over a [`MockSerialLink`], usable from another thread
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a line for the next `read_line` call.
    pub fn push_line(&self, line: impl Into<Vec<u8>>) {
        self.lock().lines.push_back(line.into());
    }

    /// Every write made to the link so far, one entry per call
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Simulate the device disappearing.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[derive(Debug)]
pub struct MockSerialLink {
    name: String,
    handle: MockHandle,
    read_timeout: Duration,
}

impl MockSerialLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: MockHandle::default(),
            read_timeout: Duration::from_millis(1),
        }
    }

    /// How long an empty `read_line` blocks, like a real port's timeout
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl SerialLink for MockSerialLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_bytes(&mut self, data: &[u8]) -> MuxResult<usize> {
        let mut state = self.handle.lock();
        if state.closed {
            return Err(MuxError::SerialClosed);
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn read_line(&mut self) -> MuxResult<Vec<u8>> {
        {
            let mut state = self.handle.lock();
            if state.closed {
                return Err(MuxError::SerialClosed);
            }
            if let Some(line) = state.lines.pop_front() {
                return Ok(line);
            }
        }
        if !self.read_timeout.is_zero() {
            std::thread::sleep(self.read_timeout);
        }
        Ok(Vec::new())
    }

    fn is_open(&self) -> bool {
        !self.handle.is_closed()
    }
}
