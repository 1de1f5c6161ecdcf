//! One-shot plugin startup.
//!
//! [`start`] runs every step in order: identify the title, resolve the
//! mapping and settings, probe the environment, then prepare, bind and
//! commit the four hooks. Nothing here is fatal. Every problem is recorded
//! as an [`Issue`] in the [`StartupReport`] and logged; polling keeps its
//! original behavior for whatever could not be hooked.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::convert::Converter;
use crate::hook::{
    EntryPoint, Environment, HookError, HookHandle, HookState, InterceptionEngine,
    ModuleEnumerator, Platform,
};
use crate::io::{IoError, Storage};
use crate::mapping::{AxisMapping, MappingProblem};
use crate::resolver::{
    ConfigResolver, DEFAULT_CONFIG_ROOT, DEFAULT_PROFILE, IdentifierError, MappingSource,
};
use crate::settings::{Settings, SettingsError};
use crate::sfo::DESCRIPTOR_PATH;
use crate::wrapper::WrapperSet;

/// Where startup looks for its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupOptions {
    /// Directory holding the mapping files and `settings.txt`.
    pub config_root: String,
    /// Descriptor the title identifier is read from.
    pub descriptor_path: String,
    /// Mapping file used when the title cannot be identified.
    pub default_profile: String,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            config_root: DEFAULT_CONFIG_ROOT.to_string(),
            descriptor_path: DESCRIPTOR_PATH.to_string(),
            default_profile: DEFAULT_PROFILE.to_string(),
        }
    }
}

/// A non-fatal condition met during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// The mapping file could not be read; the default mapping is used.
    ConfigMissing { path: String, error: IoError },
    /// The mapping file was read but not applied completely.
    ConfigMalformed {
        path: String,
        problem: MappingProblem,
    },
    /// No title identifier; the default profile is used.
    IdentifierUnavailable(IdentifierError),
    /// A line of the settings file was skipped.
    SettingsInvalid {
        path: String,
        error: SettingsError,
    },
    /// The host has no address for the entry point.
    HookAddressUnresolved(EntryPoint),
    /// Installing the hook failed for another reason.
    HookFailed { entry: EntryPoint, error: HookError },
    /// The probe failed; no hook was attempted.
    EnvironmentProbeFailure(HookError),
}

impl core::fmt::Display for Issue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConfigMissing { path, error } => {
                write!(f, "no mapping at {path} ({error}), using defaults")
            },
            Self::ConfigMalformed { path, problem } => {
                write!(f, "malformed mapping {path}: {problem}")
            },
            Self::IdentifierUnavailable(e) => {
                write!(f, "no title identifier ({e}), using default profile")
            },
            Self::SettingsInvalid { path, error } => write!(f, "{path}: {error}"),
            Self::HookAddressUnresolved(entry) => {
                write!(f, "{} not linked, not hooked", entry.name())
            },
            Self::HookFailed { entry, error } => {
                write!(f, "failed to hook {}: {error}", entry.name())
            },
            Self::EnvironmentProbeFailure(e) => write!(f, "{e}, no hooks installed"),
        }
    }
}

/// Everything startup decided and did.
pub struct StartupReport<P: Platform> {
    pub title_id: Option<String>,
    /// Mapping file that was consulted.
    pub mapping_path: String,
    pub mapping: AxisMapping,
    pub settings: Settings,
    /// `None` if the probe failed.
    pub environment: Option<Environment>,
    /// Outcome per attempted entry point, in [`EntryPoint::ALL`] order.
    pub hooks: Vec<(EntryPoint, Result<HookHandle, HookError>)>,
    pub issues: Vec<Issue>,
    /// The engine owning the installed hooks, kept for a supervised restore.
    pub engine: Option<InterceptionEngine<P>>,
}

impl<P: Platform> StartupReport<P> {
    /// The converter the wrappers were bound with.
    pub fn converter(&self) -> Converter {
        Converter::new(self.mapping, &self.settings)
    }

    /// Number of hooks that ended installed.
    pub fn installed(&self) -> usize {
        self.hooks.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn state(&self, entry: EntryPoint) -> HookState {
        self.engine
            .as_ref()
            .map_or(HookState::Uninstalled, |e| e.state(entry))
    }
}

/// Resolve the configuration and install every hook.
pub fn start<P: Platform>(
    platform: P,
    storage: &dyn Storage,
    modules: &dyn ModuleEnumerator,
    wrappers: &dyn WrapperSet,
    options: &StartupOptions,
) -> StartupReport<P> {
    let mut issues = Vec::new();
    let resolver = ConfigResolver::new(&options.config_root, storage)
        .with_default_profile(&options.default_profile);

    let title_id = match resolver.title_id(&options.descriptor_path) {
        Ok(id) => Some(id),
        Err(e) => {
            issues.push(Issue::IdentifierUnavailable(e));
            None
        },
    };

    let resolved = resolver.resolve_mapping(title_id.as_deref());
    match resolved.source {
        MappingSource::File => dlog!("mapping {}", resolved.path),
        MappingSource::Missing(error) => issues.push(Issue::ConfigMissing {
            path: resolved.path.clone(),
            error,
        }),
        MappingSource::Malformed(problem) => issues.push(Issue::ConfigMalformed {
            path: resolved.path.clone(),
            problem,
        }),
    }

    let loaded = resolver.resolve_settings();
    issues.extend(loaded.errors.iter().map(|&error| Issue::SettingsInvalid {
        path: loaded.path.clone(),
        error,
    }));
    let converter = Converter::new(resolved.mapping, &loaded.settings);

    let mut report = StartupReport {
        title_id,
        mapping_path: resolved.path,
        mapping: resolved.mapping,
        settings: loaded.settings,
        environment: None,
        hooks: Vec::new(),
        issues,
        engine: None,
    };

    match InterceptionEngine::probe(platform) {
        Ok(mut engine) => {
            engine.register_scan_targets(modules);
            for entry in EntryPoint::ALL {
                let result = install_one(&mut engine, wrappers, entry, converter);
                match result {
                    Err(HookError::UnresolvedAddress) => {
                        report.issues.push(Issue::HookAddressUnresolved(entry))
                    },
                    Err(error) => report.issues.push(Issue::HookFailed { entry, error }),
                    Ok(_) => {},
                }
                report.hooks.push((entry, result));
            }
            if report.installed() > 0 {
                engine.sync_caches();
            }
            report.environment = Some(engine.environment());
            report.engine = Some(engine);
        },
        Err(e) => report.issues.push(Issue::EnvironmentProbeFailure(e)),
    }

    for issue in &report.issues {
        dlog!("{}", issue);
    }
    dlog!(
        "{} of {} hooks installed",
        report.installed(),
        EntryPoint::ALL.len()
    );
    report
}

fn install_one<P: Platform>(
    engine: &mut InterceptionEngine<P>,
    wrappers: &dyn WrapperSet,
    entry: EntryPoint,
    converter: Converter,
) -> Result<HookHandle, HookError> {
    let address = engine.platform().entry_address(entry);
    let pending = engine.prepare(entry, address)?;
    // The wrapper must be able to reach the original before live code jumps
    // to it.
    wrappers.bind(&pending.handle(), converter)?;
    engine.commit(pending, wrappers.address(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn default_options() {
        let options = StartupOptions::default();
        assert_eq!(options.config_root, "ms0:/seplugins/ra2d");
        assert_eq!(options.descriptor_path, "disc0:/PSP_GAME/PARAM.SFO");
        assert_eq!(options.default_profile, "homebrew");
    }

    #[test]
    fn issues_name_the_entry_point() {
        let issue = Issue::HookFailed {
            entry: EntryPoint::PeekBufferNegative,
            error: HookError::OutOfMemory,
        };
        assert_eq!(
            format!("{issue}"),
            "failed to hook sceCtrlPeekBufferNegative: out of memory for trampoline"
        );
        assert_eq!(
            format!("{}", Issue::HookAddressUnresolved(EntryPoint::ReadBufferPositive)),
            "sceCtrlReadBufferPositive not linked, not hooked"
        );
    }
}
