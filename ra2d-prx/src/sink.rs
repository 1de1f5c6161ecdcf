//! Append-only log file behind `ra2d::dlog!`.

use psp::io::{File, IoError};
use psp::sys::IoOpenFlags;
use ra2d::log::LogSink;

pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn open(path: &str) -> Result<Self, IoError> {
        let file = File::open(
            path,
            IoOpenFlags::WR_ONLY | IoOpenFlags::CREAT | IoOpenFlags::APPEND,
        )?;
        Ok(Self { file })
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &[u8]) {
        let _ = self.file.write(line);
    }
}

// SAFETY: the sink is only reached through the log mutex, and a file
// descriptor is a plain integer valid on every thread of the module.
unsafe impl Send for FileSink {}
