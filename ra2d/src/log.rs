//! Best-effort diagnostic logging.
//!
//! [`dlog!`](crate::dlog) formats a message into a fixed 128-byte stack
//! buffer and hands it to the globally installed [`LogSink`]. Until a sink is
//! installed (or if opening the log file failed) every call is a no-op, so
//! logging never changes functional behavior.
//!
//! # Example
//!
//! ```ignore
//! ra2d::log::install(Box::new(my_sink));
//! ra2d::dlog!("hooked {} at {:#010x}", entry.name(), addr);
//! ```
//!
//! The polling wrappers never log.

use alloc::boxed::Box;
use core::fmt::{self, Write};

use spin::Mutex;

/// Maximum length of one formatted log line. Longer lines are truncated.
pub const LINE_CAPACITY: usize = 128;

/// Destination for formatted log lines, e.g. an append-only file.
pub trait LogSink: Send {
    /// Write one complete line. Failures are the sink's own business.
    fn write_line(&mut self, line: &[u8]);
}

static SINK: Mutex<Option<Box<dyn LogSink>>> = Mutex::new(None);

/// Install the global sink, replacing any previous one.
pub fn install(sink: Box<dyn LogSink>) {
    *SINK.lock() = Some(sink);
}

/// Remove the global sink and return it.
pub fn uninstall() -> Option<Box<dyn LogSink>> {
    SINK.lock().take()
}

/// Whether a sink is currently installed.
pub fn is_enabled() -> bool {
    SINK.lock().is_some()
}

#[doc(hidden)]
pub fn write_fmt(args: fmt::Arguments<'_>) {
    if !is_enabled() {
        return;
    }
    // Formatting may log on its own, so the lock is only taken afterwards.
    let mut line = LineBuffer::new();
    let _ = line.write_fmt(args);
    line.terminate();
    if let Some(sink) = SINK.lock().as_mut() {
        sink.write_line(line.as_bytes());
    }
}

/// Print a formatted line to the diagnostic log.
///
/// A newline is appended to every line.
#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {
        $crate::log::write_fmt(format_args!($($arg)*))
    };
}

/// Fixed-size line buffer that silently truncates.
pub struct LineBuffer {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append a trailing newline, overwriting the last byte when full.
    fn terminate(&mut self) {
        if self.len == LINE_CAPACITY {
            self.buf[LINE_CAPACITY - 1] = b'\n';
        } else {
            self.buf[self.len] = b'\n';
            self.len += 1;
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = LINE_CAPACITY - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}
