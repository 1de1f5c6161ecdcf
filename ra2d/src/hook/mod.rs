//! Trampoline hooks over the `sceCtrl` buffer polling functions.
//!
//! Installing a hook relocates the first two instructions of a polling
//! routine into a trampoline and overwrites them with a jump to a wrapper.
//! The wrapper calls the trampoline to run the untouched original, so every
//! other caller still gets the original semantics.
//!
//! How the routine is reached depends on where the plugin runs, and is
//! decided once by [`InterceptionEngine::probe`]:
//!
//! - [`Direct`] (PS Vita PSP emulator): every module has its own copy of the
//!   `jr $ra; syscall` import stub, so the canonical stub and every identical
//!   stub in other modules are patched.
//! - [`IndirectDispatch`] (real hardware): the import stub is a `j` into the
//!   kernel routine. The routine itself is patched to jump to a syscall stub
//!   that re-enters the wrapper with the right privilege level.
//!
//! All memory access goes through the host's [`Platform`]; the engine never
//! dereferences an address itself.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = InterceptionEngine::probe(platform)?;
//! engine.register_scan_targets(&modules);
//! let addr = engine.platform().entry_address(EntryPoint::ReadBufferPositive);
//! let handle = engine.install(EntryPoint::ReadBufferPositive, addr, wrapper_addr)?;
//! engine.sync_caches();
//! ```

mod direct;
mod indirect;

pub use direct::Direct;
pub use indirect::IndirectDispatch;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::convert::Polarity;

// ── EntryPoint ──────────────────────────────────────────────────────

/// The four hooked `sceCtrl` polling functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    ReadBufferPositive,
    ReadBufferNegative,
    PeekBufferPositive,
    PeekBufferNegative,
}

impl EntryPoint {
    pub const ALL: [Self; 4] = [
        Self::ReadBufferPositive,
        Self::ReadBufferNegative,
        Self::PeekBufferPositive,
        Self::PeekBufferNegative,
    ];

    /// Position in [`ALL`](Self::ALL).
    pub const fn index(self) -> usize {
        match self {
            Self::ReadBufferPositive => 0,
            Self::ReadBufferNegative => 1,
            Self::PeekBufferPositive => 2,
            Self::PeekBufferNegative => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadBufferPositive => "sceCtrlReadBufferPositive",
            Self::ReadBufferNegative => "sceCtrlReadBufferNegative",
            Self::PeekBufferPositive => "sceCtrlPeekBufferPositive",
            Self::PeekBufferNegative => "sceCtrlPeekBufferNegative",
        }
    }

    /// Button sense of the samples this function returns.
    pub const fn polarity(self) -> Polarity {
        match self {
            Self::ReadBufferPositive | Self::PeekBufferPositive => Polarity::Positive,
            Self::ReadBufferNegative | Self::PeekBufferNegative => Polarity::Negative,
        }
    }
}

// ── HookError ───────────────────────────────────────────────────────

/// Error from installing or restoring a hook.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum HookError {
    /// The entry point (or its jump target) resolved to address zero.
    UnresolvedAddress,
    /// The patch site does not hold the instruction shape the strategy
    /// relocates.
    UnsupportedInstruction { address: u32, word: u32 },
    /// The entry point is already hooked.
    AlreadyInstalled,
    /// No executable memory for a trampoline or stub.
    OutOfMemory,
    /// The host could not assign a syscall number to the wrapper.
    SyscallUnavailable,
    /// The environment probe failed; nothing can be installed.
    ProbeFailed(i32),
}

impl core::fmt::Debug for HookError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnresolvedAddress => write!(f, "HookError::UnresolvedAddress"),
            Self::UnsupportedInstruction { address, word } => write!(
                f,
                "HookError::UnsupportedInstruction({address:#010x}: {word:#010x})"
            ),
            Self::AlreadyInstalled => write!(f, "HookError::AlreadyInstalled"),
            Self::OutOfMemory => write!(f, "HookError::OutOfMemory"),
            Self::SyscallUnavailable => write!(f, "HookError::SyscallUnavailable"),
            Self::ProbeFailed(code) => write!(f, "HookError::ProbeFailed({:#010x})", *code as u32),
        }
    }
}

impl core::fmt::Display for HookError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnresolvedAddress => write!(f, "entry point address not resolved"),
            Self::UnsupportedInstruction { address, word } => write!(
                f,
                "unsupported instruction {word:#010x} at {address:#010x}"
            ),
            Self::AlreadyInstalled => write!(f, "hook already installed"),
            Self::OutOfMemory => write!(f, "out of memory for trampoline"),
            Self::SyscallUnavailable => write!(f, "no syscall number for wrapper"),
            Self::ProbeFailed(code) => {
                write!(f, "environment probe failed: {:#010x}", *code as u32)
            },
        }
    }
}

// ── Host capabilities ───────────────────────────────────────────────

/// Execution environment reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// The PS Vita's PSP emulator.
    Emulated,
    /// Real PSP hardware (or an emulator indistinguishable from it).
    Hardware,
}

/// Word-granular access to code memory.
///
/// Implementations on hardware write through the cached kernel segment and
/// rely on [`sync_caches`](Self::sync_caches) before patched code runs.
pub trait CodeMemory {
    fn read_word(&self, addr: u32) -> u32;
    fn write_word(&mut self, addr: u32, word: u32);
    /// Allocate `words` instructions of executable memory that lives for
    /// the rest of the process.
    fn alloc_code(&mut self, words: usize) -> Result<u32, HookError>;
    /// Write back the data cache and invalidate the instruction cache.
    fn sync_caches(&mut self);
}

/// Everything the engine needs from the firmware.
pub trait Platform: CodeMemory {
    /// One-time execution environment probe.
    fn probe_environment(&mut self) -> Result<Environment, HookError>;
    /// Address of the import stub of `entry`, or 0 if it is not linked.
    fn entry_address(&self, entry: EntryPoint) -> u32;
    /// Syscall number through which `function` can be called.
    fn syscall_number(&mut self, function: u32) -> Result<u32, HookError>;
}

/// Executable segment of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegment {
    pub base: u32,
    /// Size in bytes.
    pub size: u32,
}

/// Lists the code of other loaded modules for the [`Direct`] scan.
pub trait ModuleEnumerator {
    fn text_segments(&self) -> Vec<TextSegment>;
}

// ── Records ─────────────────────────────────────────────────────────

/// Lifecycle of one hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Uninstalled,
    Installed,
}

/// Everything the engine knows about one hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRecord {
    pub entry: EntryPoint,
    /// Address the caller supplied (the import stub).
    pub address: u32,
    /// Address whose head was relocated; equals `address` for [`Direct`].
    pub target: u32,
    /// The two relocated instruction words.
    pub saved: [u32; 2],
    /// Address of the trampoline that runs the original.
    pub trampoline: u32,
    /// Every address overwritten with a jump, for restore.
    pub sites: Vec<u32>,
    pub state: HookState,
}

/// What a wrapper needs to call the original of an installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookHandle {
    pub entry: EntryPoint,
    /// Address of the trampoline; callable with the polling ABI.
    pub trampoline: u32,
    /// Whether the wrapper must raise the privilege level around the call.
    pub requires_elevation: bool,
}

/// A hook whose trampoline is built but whose entry point is still live.
#[derive(Debug)]
pub struct PendingHook {
    record: HookRecord,
    requires_elevation: bool,
}

impl PendingHook {
    /// Handle for binding the wrapper before [`InterceptionEngine::commit`].
    pub fn handle(&self) -> HookHandle {
        HookHandle {
            entry: self.record.entry,
            trampoline: self.record.trampoline,
            requires_elevation: self.requires_elevation,
        }
    }
}

// ── Strategy ────────────────────────────────────────────────────────

/// One way of relocating an entry point.
pub trait HookStrategy {
    fn name(&self) -> &'static str;

    /// Whether wrappers run with the caller's (lowered) privilege level and
    /// must raise it to call the original.
    fn requires_elevation(&self) -> bool;

    /// Extra code to scan for copies of patched entry points.
    fn register_scan_targets(&mut self, _segments: Vec<TextSegment>) {}

    /// Build the trampoline for the routine behind `address` without
    /// touching live code.
    fn prepare(
        &mut self,
        platform: &mut dyn Platform,
        entry: EntryPoint,
        address: u32,
    ) -> Result<HookRecord, HookError>;

    /// Redirect live code to `wrapper`, appending every patched address to
    /// `record.sites`.
    fn commit(
        &mut self,
        platform: &mut dyn Platform,
        record: &mut HookRecord,
        wrapper: u32,
    ) -> Result<(), HookError>;
}

/// Read the two words at `addr` and copy them into a fresh trampoline laid
/// out by `layout`.
pub(crate) fn build_trampoline(
    platform: &mut dyn Platform,
    addr: u32,
    layout: impl FnOnce([u32; 2]) -> [u32; 3],
) -> Result<([u32; 2], u32), HookError> {
    let saved = [
        platform.read_word(addr),
        platform.read_word(addr + crate::mips::WORD),
    ];
    let trampoline = platform.alloc_code(3)?;
    for (i, word) in layout(saved).into_iter().enumerate() {
        platform.write_word(trampoline + i as u32 * crate::mips::WORD, word);
    }
    Ok((saved, trampoline))
}

/// Overwrite the head of `site` with `j target; nop`.
pub(crate) fn write_jump(platform: &mut dyn Platform, site: u32, target: u32) {
    platform.write_word(site, crate::mips::j(target));
    platform.write_word(site + crate::mips::WORD, crate::mips::NOP);
}

// ── InterceptionEngine ──────────────────────────────────────────────

/// Owns every hook record and the strategy chosen by the probe.
pub struct InterceptionEngine<P: Platform> {
    platform: P,
    environment: Environment,
    strategy: Box<dyn HookStrategy>,
    records: Vec<HookRecord>,
}

impl<P: Platform> InterceptionEngine<P> {
    /// Probe the environment once and pick the matching strategy.
    pub fn probe(mut platform: P) -> Result<Self, HookError> {
        let environment = platform.probe_environment()?;
        let strategy: Box<dyn HookStrategy> = match environment {
            Environment::Emulated => Box::new(Direct::new()),
            Environment::Hardware => Box::new(IndirectDispatch::new()),
        };
        dlog!("environment {:?}, strategy {}", environment, strategy.name());
        Ok(Self {
            platform,
            environment,
            strategy,
            records: Vec::new(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Hand the text segments of other modules to the strategy. Only the
    /// [`Direct`] strategy scans them.
    pub fn register_scan_targets(&mut self, modules: &dyn ModuleEnumerator) {
        self.strategy.register_scan_targets(modules.text_segments());
    }

    /// State of the hook for `entry`.
    pub fn state(&self, entry: EntryPoint) -> HookState {
        self.record(entry)
            .map_or(HookState::Uninstalled, |r| r.state)
    }

    pub fn record(&self, entry: EntryPoint) -> Option<&HookRecord> {
        self.records.iter().find(|r| r.entry == entry)
    }

    pub fn records(&self) -> &[HookRecord] {
        &self.records
    }

    /// Build the trampoline for `entry` at `address`. Live code is not
    /// modified until [`commit`](Self::commit).
    pub fn prepare(&mut self, entry: EntryPoint, address: u32) -> Result<PendingHook, HookError> {
        if address == 0 {
            return Err(HookError::UnresolvedAddress);
        }
        if self.state(entry) == HookState::Installed {
            return Err(HookError::AlreadyInstalled);
        }
        let record = self.strategy.prepare(&mut self.platform, entry, address)?;
        Ok(PendingHook {
            record,
            requires_elevation: self.strategy.requires_elevation(),
        })
    }

    /// Redirect the entry point of `pending` to `wrapper`.
    pub fn commit(&mut self, pending: PendingHook, wrapper: u32) -> Result<HookHandle, HookError> {
        let handle = pending.handle();
        let mut record = pending.record;
        if self.state(record.entry) == HookState::Installed {
            return Err(HookError::AlreadyInstalled);
        }
        self.strategy
            .commit(&mut self.platform, &mut record, wrapper)?;
        record.state = HookState::Installed;
        dlog!(
            "hooked {} at {:#010x} ({} site(s)), trampoline {:#010x}",
            record.entry.name(),
            record.target,
            record.sites.len(),
            record.trampoline
        );
        self.records.retain(|r| r.entry != record.entry);
        self.records.push(record);
        Ok(handle)
    }

    /// [`prepare`](Self::prepare) and [`commit`](Self::commit) in one step.
    pub fn install(
        &mut self,
        entry: EntryPoint,
        address: u32,
        wrapper: u32,
    ) -> Result<HookHandle, HookError> {
        let pending = self.prepare(entry, address)?;
        self.commit(pending, wrapper)
    }

    /// Make patched code visible to instruction fetch.
    pub fn sync_caches(&mut self) {
        self.platform.sync_caches();
    }

    /// Put the original instructions back at every patched site.
    ///
    /// Returns the number of hooks restored. Only for supervised handoff:
    /// wrappers may still be running on other threads otherwise.
    pub fn restore_all(&mut self) -> usize {
        let mut restored = 0;
        for record in &mut self.records {
            if record.state != HookState::Installed {
                continue;
            }
            for &site in &record.sites {
                self.platform.write_word(site, record.saved[0]);
                self.platform
                    .write_word(site + crate::mips::WORD, record.saved[1]);
            }
            record.state = HookState::Uninstalled;
            restored += 1;
        }
        if restored > 0 {
            self.platform.sync_caches();
        }
        restored
    }

    /// Give the platform back, e.g. after a restore.
    pub fn into_platform(self) -> P {
        self.platform
    }
}
