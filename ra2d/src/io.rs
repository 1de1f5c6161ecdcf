//! File access as seen by the resolver.
//!
//! Raw descriptor I/O belongs to the host; the library only needs "read this
//! whole file". [`Storage`] is implemented over `sceIo*` by `ra2d-prx` and by
//! in-memory maps in tests.

use alloc::vec::Vec;

// ── IoError ─────────────────────────────────────────────────────────

/// Error from a host I/O operation, wrapping the raw SCE error code.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IoError(pub i32);

impl IoError {
    /// `SCE_KERNEL_ERROR_ERRNO_FILE_NOT_FOUND`.
    pub const NOT_FOUND: Self = Self(0x8001_0002u32 as i32);
    /// `SCE_KERNEL_ERROR_ERRNO_FILE_TOO_BIG`, also used for files over a
    /// read limit.
    pub const FILE_TOO_LARGE: Self = Self(0x8001_001Bu32 as i32);
}

impl core::fmt::Debug for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "IoError({:#010x})", self.0 as u32)
    }
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "I/O error {:#010x}", self.0 as u32)
    }
}

// ── Storage ─────────────────────────────────────────────────────────

/// Upper bound for every file the resolver reads.
pub const MAX_FILE_SIZE: usize = 64 * 1024;

/// Read-only access to whole files by PSP path (e.g. `"ms0:/seplugins/x"`).
pub trait Storage {
    /// Read an entire file.
    ///
    /// Files longer than `max_len` bytes must be refused with
    /// [`IoError::FILE_TOO_LARGE`] before anything is allocated for them.
    fn read(&self, path: &str, max_len: usize) -> Result<Vec<u8>, IoError>;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn read(&self, path: &str, max_len: usize) -> Result<Vec<u8>, IoError> {
        (**self).read(path, max_len)
    }
}

/// Check a file length against a read limit.
pub fn check_len(len: usize, max_len: usize) -> Result<(), IoError> {
    if len > max_len {
        return Err(IoError::FILE_TOO_LARGE);
    }
    Ok(())
}
