//! Simulated host for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;

use ra2d::convert::Converter;
use ra2d::hook::{
    CodeMemory, EntryPoint, Environment, HookError, HookHandle, ModuleEnumerator, Platform,
    TextSegment,
};
use ra2d::io::{IoError, Storage};
use ra2d::mips::{self, JR_RA, NOP, WORD};
use ra2d::wrapper::WrapperSet;

/// Import stubs of the four entry points, two words apart.
pub const STUB_BASE: u32 = 0x8880_0000;
/// Kernel routines behind the stubs on hardware.
pub const ROUTINE_BASE: u32 = 0x8800_1000;
pub const ROUTINE_STRIDE: u32 = 0x100;
/// Executable heap for trampolines and syscall stubs.
pub const CODE_BASE: u32 = 0x8890_0000;
/// Addresses the fake wrappers claim to live at.
pub const WRAPPER_BASE: u32 = 0x88A0_0000;
/// Syscall numbers handed out by the simulated kernel.
pub const FIRST_SYSCALL: u32 = 0x2040;

pub fn stub_address(entry: EntryPoint) -> u32 {
    STUB_BASE + entry.index() as u32 * 2 * WORD
}

pub fn routine_address(entry: EntryPoint) -> u32 {
    ROUTINE_BASE + entry.index() as u32 * ROUTINE_STRIDE
}

/// The two import stub words the emulator links for `entry`.
pub fn emulator_stub(entry: EntryPoint) -> [u32; 2] {
    [JR_RA, mips::syscall(0x1000 + entry.index() as u32)]
}

/// First two instructions of the kernel routine for `entry`.
pub fn routine_head(entry: EntryPoint) -> [u32; 2] {
    // addiu $sp, $sp, -16; sw $ra, n($sp)
    [0x27BD_FFF0, 0xAFBF_0000 + entry.index() as u32 * 4]
}

pub struct SimPlatform {
    pub memory: BTreeMap<u32, u32>,
    pub probe: Result<Environment, HookError>,
    pub entries: [u32; 4],
    pub syscalls: BTreeMap<u32, u32>,
    pub syscalls_available: bool,
    pub next_code: u32,
    pub code_limit: u32,
    pub syncs: usize,
    pub probes: usize,
}

impl SimPlatform {
    fn empty(probe: Result<Environment, HookError>) -> Self {
        Self {
            memory: BTreeMap::new(),
            probe,
            entries: EntryPoint::ALL.map(stub_address),
            syscalls: BTreeMap::new(),
            syscalls_available: true,
            next_code: CODE_BASE,
            code_limit: CODE_BASE + 0x1000,
            syncs: 0,
            probes: 0,
        }
    }

    /// The PS Vita emulator: each stub is `jr $ra; syscall N`.
    pub fn emulated() -> Self {
        let mut sim = Self::empty(Ok(Environment::Emulated));
        for entry in EntryPoint::ALL {
            sim.store(stub_address(entry), &emulator_stub(entry));
        }
        sim
    }

    /// Real hardware: each stub is `j routine; nop`.
    pub fn hardware() -> Self {
        let mut sim = Self::empty(Ok(Environment::Hardware));
        for entry in EntryPoint::ALL {
            sim.store(
                stub_address(entry),
                &[mips::j(routine_address(entry)), NOP],
            );
            sim.store(routine_address(entry), &routine_head(entry));
        }
        sim
    }

    pub fn store(&mut self, addr: u32, words: &[u32]) {
        for (i, &w) in words.iter().enumerate() {
            self.memory.insert(addr + i as u32 * WORD, w);
        }
    }

    pub fn load(&self, addr: u32, words: usize) -> Vec<u32> {
        (0..words as u32)
            .map(|i| self.read_word(addr + i * WORD))
            .collect()
    }
}

impl CodeMemory for SimPlatform {
    fn read_word(&self, addr: u32) -> u32 {
        self.memory.get(&addr).copied().unwrap_or(NOP)
    }

    fn write_word(&mut self, addr: u32, word: u32) {
        self.memory.insert(addr, word);
    }

    fn alloc_code(&mut self, words: usize) -> Result<u32, HookError> {
        let addr = self.next_code;
        let end = addr + words as u32 * WORD;
        if end > self.code_limit {
            return Err(HookError::OutOfMemory);
        }
        self.next_code = end;
        Ok(addr)
    }

    fn sync_caches(&mut self) {
        self.syncs += 1;
    }
}

impl Platform for SimPlatform {
    fn probe_environment(&mut self) -> Result<Environment, HookError> {
        self.probes += 1;
        self.probe
    }

    fn entry_address(&self, entry: EntryPoint) -> u32 {
        self.entries[entry.index()]
    }

    fn syscall_number(&mut self, function: u32) -> Result<u32, HookError> {
        if !self.syscalls_available {
            return Err(HookError::SyscallUnavailable);
        }
        let next = FIRST_SYSCALL + self.syscalls.len() as u32;
        Ok(*self.syscalls.entry(function).or_insert(next))
    }
}

/// A fixed list of other modules' code.
#[derive(Default)]
pub struct Modules(pub Vec<TextSegment>);

impl ModuleEnumerator for Modules {
    fn text_segments(&self) -> Vec<TextSegment> {
        self.0.clone()
    }
}

/// In-memory file system.
#[derive(Default)]
pub struct MemStorage(pub BTreeMap<String, Vec<u8>>);

impl MemStorage {
    pub fn with(mut self, path: &str, contents: &[u8]) -> Self {
        self.0.insert(path.to_string(), contents.to_vec());
        self
    }
}

impl Storage for MemStorage {
    fn read(&self, path: &str, max_len: usize) -> Result<Vec<u8>, IoError> {
        let data = self.0.get(path).ok_or(IoError::NOT_FOUND)?;
        ra2d::io::check_len(data.len(), max_len)?;
        Ok(data.clone())
    }
}

/// Wrappers that only record what they were bound to.
#[derive(Default)]
pub struct RecordingWrappers {
    pub bound: RefCell<Vec<(HookHandle, Converter)>>,
}

impl RecordingWrappers {
    pub fn handle(&self, entry: EntryPoint) -> Option<HookHandle> {
        self.bound
            .borrow()
            .iter()
            .find(|(h, _)| h.entry == entry)
            .map(|(h, _)| *h)
    }
}

impl WrapperSet for RecordingWrappers {
    fn address(&self, entry: EntryPoint) -> u32 {
        WRAPPER_BASE + entry.index() as u32 * 0x40
    }

    fn bind(&self, handle: &HookHandle, converter: Converter) -> Result<(), HookError> {
        let mut bound = self.bound.borrow_mut();
        if bound.iter().any(|(h, _)| h.entry == handle.entry) {
            return Err(HookError::AlreadyInstalled);
        }
        bound.push((*handle, converter));
        Ok(())
    }
}

/// Build a PARAM.SFO holding the given string entries.
pub fn param_sfo(strings: &[(&str, &str)]) -> Vec<u8> {
    let mut keys = Vec::new();
    let mut data = Vec::new();
    let mut index = Vec::new();
    for (key, value) in strings {
        let key_offset = keys.len() as u16;
        keys.extend_from_slice(key.as_bytes());
        keys.push(0);
        let data_offset = data.len() as u32;
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        let len = value.len() as u32 + 1;
        let max_len = (len + 3) & !3;
        data.resize(data_offset as usize + max_len as usize, 0);

        index.extend_from_slice(&key_offset.to_le_bytes());
        index.extend_from_slice(&0x0204u16.to_le_bytes());
        index.extend_from_slice(&len.to_le_bytes());
        index.extend_from_slice(&max_len.to_le_bytes());
        index.extend_from_slice(&data_offset.to_le_bytes());
    }
    while keys.len() % 4 != 0 {
        keys.push(0);
    }

    let key_table = 20 + index.len() as u32;
    let data_table = key_table + keys.len() as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"\0PSF");
    out.extend_from_slice(&0x0101u32.to_le_bytes());
    out.extend_from_slice(&key_table.to_le_bytes());
    out.extend_from_slice(&data_table.to_le_bytes());
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    out.extend_from_slice(&index);
    out.extend_from_slice(&keys);
    out.extend_from_slice(&data);
    out
}
