//! Buffered program output with incremental draining.

use std::cell::RefCell;

use crate::eval::OutputSink;

/// Collects everything user code prints and hands it out in increments.
///
/// Each [`drain`](Self::drain) returns and discards the text written since
/// the previous drain, so consecutive drains partition the output and the
/// buffer never holds more than one undrained increment.
#[derive(Debug, Default)]
pub struct OutputMultiplexer {
    inner: RefCell<Buffer>,
}

#[derive(Debug, Default)]
struct Buffer {
    pending: String,
    written: usize,
}

impl OutputMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, text: &str) {
        let mut buffer = self.inner.borrow_mut();
        buffer.pending.push_str(text);
        buffer.written += text.len();
    }

    /// Text written since the last drain, or `None` if there is none.
    pub fn drain(&self) -> Option<String> {
        let mut buffer = self.inner.borrow_mut();
        if buffer.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut buffer.pending))
    }

    /// Total bytes written so far, drained or not.
    pub fn written(&self) -> usize {
        self.inner.borrow().written
    }
}

impl OutputSink for OutputMultiplexer {
    fn write(&self, text: &str) {
        OutputMultiplexer::write(self, text);
    }
}
