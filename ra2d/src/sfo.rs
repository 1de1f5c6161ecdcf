//! PARAM.SFO reader for the title identifier.
//!
//! # Layout
//!
//! All integers little endian.
//!
//! ```text
//! Header (20 bytes):
//!   magic: b"\0PSF"
//!   version: u32
//!   key_table: u32      offset of the key table
//!   data_table: u32     offset of the data table
//!   count: u32          number of index entries
//! Index entry (16 bytes, `count` of them, right after the header):
//!   key_offset: u16     relative to key_table, NUL-terminated key
//!   data_format: u16    0x0004 utf8-s, 0x0204 utf8, 0x0404 int32
//!   data_len: u32       used bytes
//!   data_max_len: u32   reserved bytes
//!   data_offset: u32    relative to data_table
//! ```

use alloc::string::String;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Path of the descriptor of the inserted disc.
pub const DESCRIPTOR_PATH: &str = "disc0:/PSP_GAME/PARAM.SFO";

/// Key holding the title identifier, e.g. `ULUS-10509`.
pub const DISC_ID_KEY: &str = "DISC_ID";

const MAGIC: &[u8; 4] = b"\0PSF";
const HEADER_LEN: usize = 20;
const ENTRY_LEN: usize = 16;

/// Storage format of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum DataFormat {
    /// UTF-8 without terminator.
    Utf8Special = 0x0004,
    /// NUL-terminated UTF-8.
    Utf8 = 0x0204,
    Int32 = 0x0404,
}

/// Error from reading a descriptor.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SfoError {
    /// Missing magic or a table pointing outside the file.
    InvalidFormat,
    /// No entry with the requested key.
    KeyNotFound,
    /// The entry exists but does not hold a string.
    NotAString,
    /// The string is not valid UTF-8.
    InvalidUtf8,
}

impl core::fmt::Debug for SfoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "SfoError::InvalidFormat"),
            Self::KeyNotFound => write!(f, "SfoError::KeyNotFound"),
            Self::NotAString => write!(f, "SfoError::NotAString"),
            Self::InvalidUtf8 => write!(f, "SfoError::InvalidUtf8"),
        }
    }
}

impl core::fmt::Display for SfoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid descriptor format"),
            Self::KeyNotFound => write!(f, "descriptor key not found"),
            Self::NotAString => write!(f, "descriptor value is not a string"),
            Self::InvalidUtf8 => write!(f, "descriptor value is not UTF-8"),
        }
    }
}

fn u16_at(data: &[u8], pos: usize) -> Result<u16, SfoError> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or(SfoError::InvalidFormat)
}

fn u32_at(data: &[u8], pos: usize) -> Result<u32, SfoError> {
    data.get(pos..pos + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(SfoError::InvalidFormat)
}

/// A validated view of a descriptor.
pub struct Sfo<'a> {
    data: &'a [u8],
    key_table: usize,
    data_table: usize,
    count: usize,
}

/// One index entry.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    /// Raw format code; see [`DataFormat`].
    pub format: u16,
    pub value: &'a [u8],
}

impl<'a> Sfo<'a> {
    /// Validate the header of `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, SfoError> {
        if data.len() < HEADER_LEN || &data[0..4] != MAGIC {
            return Err(SfoError::InvalidFormat);
        }
        let key_table = u32_at(data, 8)? as usize;
        let data_table = u32_at(data, 12)? as usize;
        let count = u32_at(data, 16)? as usize;

        let index_end = count
            .checked_mul(ENTRY_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or(SfoError::InvalidFormat)?;
        if index_end > data.len() || key_table > data.len() || data_table > data.len() {
            return Err(SfoError::InvalidFormat);
        }
        Ok(Self {
            data,
            key_table,
            data_table,
            count,
        })
    }

    /// Number of index entries.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Decode the entry at `index`.
    pub fn entry(&self, index: usize) -> Result<Entry<'a>, SfoError> {
        if index >= self.count {
            return Err(SfoError::InvalidFormat);
        }
        let base = HEADER_LEN + index * ENTRY_LEN;
        let key_offset = u16_at(self.data, base)? as usize;
        let format = u16_at(self.data, base + 2)?;
        let data_len = u32_at(self.data, base + 4)? as usize;
        let data_offset = u32_at(self.data, base + 12)? as usize;

        let key_rest = self
            .data
            .get(self.key_table.saturating_add(key_offset)..)
            .ok_or(SfoError::InvalidFormat)?;
        let key_len = key_rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(SfoError::InvalidFormat)?;

        let value_start = self
            .data_table
            .checked_add(data_offset)
            .ok_or(SfoError::InvalidFormat)?;
        let value_end = value_start
            .checked_add(data_len)
            .ok_or(SfoError::InvalidFormat)?;
        let value = self
            .data
            .get(value_start..value_end)
            .ok_or(SfoError::InvalidFormat)?;

        Ok(Entry {
            key: &key_rest[..key_len],
            format,
            value,
        })
    }

    /// Iterate over all entries, malformed ones included as errors.
    pub fn entries(&self) -> impl Iterator<Item = Result<Entry<'a>, SfoError>> + '_ {
        (0..self.count).map(|i| self.entry(i))
    }

    /// The string value stored under `key`.
    ///
    /// Malformed entries are skipped; if the key is not found elsewhere the
    /// first of them is reported.
    pub fn get_str(&self, key: &str) -> Result<&'a str, SfoError> {
        let mut malformed = None;
        for entry in self.entries() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    malformed.get_or_insert(e);
                    continue;
                },
            };
            if entry.key != key.as_bytes() {
                continue;
            }
            return match DataFormat::try_from(entry.format) {
                Ok(DataFormat::Utf8 | DataFormat::Utf8Special) => {
                    let end = entry
                        .value
                        .iter()
                        .position(|&b| b == 0)
                        .unwrap_or(entry.value.len());
                    core::str::from_utf8(&entry.value[..end]).map_err(|_| SfoError::InvalidUtf8)
                },
                _ => Err(SfoError::NotAString),
            };
        }
        Err(malformed.unwrap_or(SfoError::KeyNotFound))
    }
}

/// Extract the `DISC_ID` string from descriptor bytes.
pub fn disc_id(data: &[u8]) -> Result<String, SfoError> {
    let sfo = Sfo::parse(data)?;
    sfo.get_str(DISC_ID_KEY).map(String::from)
}
