//! Per-title configuration lookup.
//!
//! The mapping for a game lives in `<root>/<DISC_ID>`, e.g.
//! `ms0:/seplugins/ra2d/ULUS-10509`. When the title cannot be identified
//! (homebrew, no disc, unreadable descriptor) the `homebrew` profile is
//! used. Converter settings are shared by all titles and live in
//! `<root>/settings.txt`.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::io::{IoError, MAX_FILE_SIZE, Storage};
use crate::mapping::{AxisMapping, MappingProblem};
use crate::settings::{SETTINGS_FILE, Settings, SettingsError};
use crate::sfo::{self, SfoError};

/// Default configuration directory.
pub const DEFAULT_CONFIG_ROOT: &str = "ms0:/seplugins/ra2d";

/// Profile key used when no title identifier is available.
pub const DEFAULT_PROFILE: &str = "homebrew";

/// Why no title identifier could be obtained.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The descriptor could not be read.
    Io(IoError),
    /// The descriptor was read but holds no usable `DISC_ID`.
    Descriptor(SfoError),
    /// The identifier cannot be used as a file name.
    InvalidName(String),
}

impl core::fmt::Debug for IdentifierError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IdentifierError::Io({e:?})"),
            Self::Descriptor(e) => write!(f, "IdentifierError::Descriptor({e:?})"),
            Self::InvalidName(n) => write!(f, "IdentifierError::InvalidName({n:?})"),
        }
    }
}

impl core::fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "descriptor unreadable: {e}"),
            Self::Descriptor(e) => write!(f, "{e}"),
            Self::InvalidName(n) => write!(f, "unusable title identifier {n:?}"),
        }
    }
}

impl From<IoError> for IdentifierError {
    fn from(e: IoError) -> Self {
        Self::Io(e)
    }
}

impl From<SfoError> for IdentifierError {
    fn from(e: SfoError) -> Self {
        Self::Descriptor(e)
    }
}

fn is_valid_profile_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Outcome of looking up the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingSource {
    /// The file was applied completely.
    File,
    /// The file could not be read; defaults were kept.
    Missing(IoError),
    /// The file was read but is malformed; see [`MappingProblem`].
    Malformed(MappingProblem),
}

/// A resolved mapping with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub path: String,
    pub mapping: AxisMapping,
    pub source: MappingSource,
}

/// Resolved settings and the lines that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub path: String,
    pub settings: Settings,
    /// `false` if the file could not be read.
    pub found: bool,
    pub errors: Vec<SettingsError>,
}

/// Reads configuration below a fixed root.
pub struct ConfigResolver<'a> {
    root: &'a str,
    storage: &'a dyn Storage,
    default_profile: &'a str,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(root: &'a str, storage: &'a dyn Storage) -> Self {
        Self {
            root: root.trim_end_matches('/'),
            storage,
            default_profile: DEFAULT_PROFILE,
        }
    }

    /// Use `profile` instead of [`DEFAULT_PROFILE`] for unidentified titles.
    pub fn with_default_profile(mut self, profile: &'a str) -> Self {
        self.default_profile = profile;
        self
    }

    /// Read the title identifier from the descriptor at `descriptor_path`.
    pub fn title_id(&self, descriptor_path: &str) -> Result<String, IdentifierError> {
        let data = self.storage.read(descriptor_path, MAX_FILE_SIZE)?;
        let id = sfo::disc_id(&data)?;
        if !is_valid_profile_name(&id) {
            return Err(IdentifierError::InvalidName(id));
        }
        Ok(id)
    }

    /// Path of the mapping file for `title`.
    pub fn mapping_path(&self, title: Option<&str>) -> String {
        format!("{}/{}", self.root, title.unwrap_or(self.default_profile))
    }

    /// Load the mapping for `title` on top of the default mapping.
    pub fn resolve_mapping(&self, title: Option<&str>) -> ResolvedMapping {
        let path = self.mapping_path(title);
        let defaults = AxisMapping::default();
        match self.storage.read(&path, MAX_FILE_SIZE) {
            Err(e) => ResolvedMapping {
                path,
                mapping: defaults,
                source: MappingSource::Missing(e),
            },
            Ok(contents) => {
                let parsed = defaults.parse(&contents);
                ResolvedMapping {
                    path,
                    mapping: parsed.mapping,
                    source: parsed
                        .problem
                        .map_or(MappingSource::File, MappingSource::Malformed),
                }
            },
        }
    }

    /// Load the shared converter settings.
    pub fn resolve_settings(&self) -> ResolvedSettings {
        let path = format!("{}/{}", self.root, SETTINGS_FILE);
        let defaults = Settings::default();
        match self.storage.read(&path, MAX_FILE_SIZE) {
            Err(_) => ResolvedSettings {
                path,
                settings: defaults,
                found: false,
                errors: Vec::new(),
            },
            Ok(contents) => {
                let loaded = defaults.parse(&contents);
                ResolvedSettings {
                    path,
                    settings: loaded.settings,
                    found: true,
                    errors: loaded.errors,
                }
            },
        }
    }
}
