//! Firmware-backed implementations of the `ra2d` host capabilities.

use alloc::vec::Vec;
use core::ffi::c_void;

use psp::io::File;
use psp::sys::{
    IoOpenFlags, SceSysMemBlockTypes, SceSysMemPartitionId, SceUid, sceKernelAllocPartitionMemory,
    sceKernelGetBlockHeadAddr,
};
use ra2d::hook::{
    CodeMemory, EntryPoint, Environment, HookError, ModuleEnumerator, Platform, TextSegment,
};
use ra2d::io::{IoError, Storage};

/// `kemulator:` devctl answered with 0 only by the PS Vita's PSP emulator.
const EMULATOR_DEVCTL_IS_EMULATOR: u32 = 0x0000_0003;

/// `SCE_KERNEL_ERROR_ERROR`, reported when a kernel export is missing.
const SCE_KERNEL_ERROR_ERROR: i32 = 0x8002_0001u32 as i32;

const MAX_MODULES: usize = 64;

// ── Runtime-resolved exports ────────────────────────────────────────

type QuerySystemCallFn = unsafe extern "C" fn(function: *const c_void) -> i32;
type GetModuleIdListFn = unsafe extern "C" fn(list: *mut SceUid, size: i32, count: *mut i32) -> i32;
type QueryModuleInfoFn = unsafe extern "C" fn(uid: SceUid, info: *mut ModuleInfo) -> i32;

/// Look up an export through SystemControl.
///
/// # Safety
///
/// `T` must be a function pointer type matching the export's ABI.
unsafe fn find_function<T: Copy>(module: &[u8], library: &[u8], nid: u32) -> Option<T> {
    debug_assert!(module.ends_with(b"\0") && library.ends_with(b"\0"));
    // SAFETY: both names are NUL-terminated.
    let addr = unsafe { psp::sys::sctrlHENFindFunction(module.as_ptr(), library.as_ptr(), nid) };
    if addr.is_null() {
        return None;
    }
    // SAFETY: forwarded caller contract; `T` is pointer sized.
    Some(unsafe { core::mem::transmute_copy::<*mut u8, T>(&addr) })
}

// ── PspPlatform ─────────────────────────────────────────────────────

/// Code memory, probe and syscall table of the running firmware.
pub struct PspPlatform {
    query_system_call: Option<QuerySystemCallFn>,
}

impl PspPlatform {
    pub const fn new() -> Self {
        Self {
            query_system_call: None,
        }
    }
}

impl CodeMemory for PspPlatform {
    fn read_word(&self, addr: u32) -> u32 {
        // SAFETY: the engine only reads linked stubs, routines and module
        // text, all mapped in kernel mode.
        unsafe { psp::hw::hw_read32(addr) }
    }

    fn write_word(&mut self, addr: u32, word: u32) {
        // SAFETY: as above; the caches are synced before the code runs.
        unsafe { psp::hw::hw_write32(addr, word) }
    }

    fn alloc_code(&mut self, words: usize) -> Result<u32, HookError> {
        // User partition, so user-mode callers of the stubs can fetch them.
        let block = unsafe {
            sceKernelAllocPartitionMemory(
                SceSysMemPartitionId::SceKernelPrimaryUserPartition,
                b"ra2d\0".as_ptr(),
                SceSysMemBlockTypes::High,
                (words * 4) as u32,
                core::ptr::null_mut(),
            )
        };
        if block.0 < 0 {
            return Err(HookError::OutOfMemory);
        }
        let addr = unsafe { sceKernelGetBlockHeadAddr(block) } as u32;
        Ok(addr)
    }

    fn sync_caches(&mut self) {
        psp::cache::dcache_writeback_all();
        psp::cache::icache_invalidate_all();
    }
}

impl Platform for PspPlatform {
    fn probe_environment(&mut self) -> Result<Environment, HookError> {
        let ret = unsafe {
            psp::sys::sceIoDevctl(
                b"kemulator:\0".as_ptr(),
                EMULATOR_DEVCTL_IS_EMULATOR,
                core::ptr::null_mut(),
                0,
                core::ptr::null_mut(),
                0,
            )
        };
        if ret == 0 {
            return Ok(Environment::Emulated);
        }
        // Syscall stubs need the syscall table, which only SystemControl
        // can reach from here.
        // SAFETY: InterruptManagerForKernel 0x8B61808B is
        // `int sceKernelQuerySystemCall(void *function)`.
        self.query_system_call = unsafe {
            find_function(
                b"sceInterruptManager\0",
                b"InterruptManagerForKernel\0",
                0x8B61_808B,
            )
        };
        match self.query_system_call {
            Some(_) => Ok(Environment::Hardware),
            None => Err(HookError::ProbeFailed(SCE_KERNEL_ERROR_ERROR)),
        }
    }

    fn entry_address(&self, entry: EntryPoint) -> u32 {
        // The addresses of our own import stubs, linked by the loader.
        let stub: unsafe extern "C" fn(*mut psp::sys::SceCtrlData, i32) -> i32 = match entry {
            EntryPoint::ReadBufferPositive => psp::sys::sceCtrlReadBufferPositive,
            EntryPoint::ReadBufferNegative => psp::sys::sceCtrlReadBufferNegative,
            EntryPoint::PeekBufferPositive => psp::sys::sceCtrlPeekBufferPositive,
            EntryPoint::PeekBufferNegative => psp::sys::sceCtrlPeekBufferNegative,
        };
        stub as usize as u32
    }

    fn syscall_number(&mut self, function: u32) -> Result<u32, HookError> {
        let query = self.query_system_call.ok_or(HookError::SyscallUnavailable)?;
        // SAFETY: resolved during the probe with the matching signature.
        let number = unsafe { query(function as *const c_void) };
        if number < 0 {
            return Err(HookError::SyscallUnavailable);
        }
        Ok(number as u32)
    }
}

// ── LoadedModules ───────────────────────────────────────────────────

/// `SceKernelModuleInfo`.
#[repr(C)]
pub struct ModuleInfo {
    size: u32,
    n_segment: u8,
    reserved: [u8; 3],
    segment_addr: [i32; 4],
    segment_size: [i32; 4],
    entry_addr: u32,
    gp_value: u32,
    text_addr: u32,
    text_size: u32,
    data_size: u32,
    bss_size: u32,
    attribute: u16,
    version: [u8; 2],
    name: [u8; 28],
}

const _: () = assert!(core::mem::size_of::<ModuleInfo>() == 96);

impl ModuleInfo {
    const fn empty() -> Self {
        Self {
            size: core::mem::size_of::<Self>() as u32,
            n_segment: 0,
            reserved: [0; 3],
            segment_addr: [0; 4],
            segment_size: [0; 4],
            entry_addr: 0,
            gp_value: 0,
            text_addr: 0,
            text_size: 0,
            data_size: 0,
            bss_size: 0,
            attribute: 0,
            version: [0; 2],
            name: [0; 28],
        }
    }
}

/// Text segments of every loaded module, through the user-mode module
/// manager exports.
pub struct LoadedModules;

impl ModuleEnumerator for LoadedModules {
    fn text_segments(&self) -> Vec<TextSegment> {
        // SAFETY: NIDs and signatures of ModuleMgrForUser.
        let (Some(get_list), Some(query_info)) = (unsafe {
            (
                find_function::<GetModuleIdListFn>(
                    b"sceModuleManager\0",
                    b"ModuleMgrForUser\0",
                    0x6443_95E2,
                ),
                find_function::<QueryModuleInfoFn>(
                    b"sceModuleManager\0",
                    b"ModuleMgrForUser\0",
                    0x748C_BED9,
                ),
            )
        }) else {
            ra2d::dlog!("module manager exports not found, no scan");
            return Vec::new();
        };

        let mut ids = [SceUid(0); MAX_MODULES];
        let mut count = 0i32;
        let ret = unsafe {
            get_list(
                ids.as_mut_ptr(),
                core::mem::size_of_val(&ids) as i32,
                &mut count,
            )
        };
        if ret < 0 {
            ra2d::dlog!("module list failed: {:#010x}", ret as u32);
            return Vec::new();
        }

        let count = (count.max(0) as usize).min(MAX_MODULES);
        let mut segments = Vec::with_capacity(count);
        for &uid in &ids[..count] {
            let mut info = ModuleInfo::empty();
            if unsafe { query_info(uid, &mut info) } < 0 || info.text_size == 0 {
                continue;
            }
            segments.push(TextSegment {
                base: info.text_addr,
                size: info.text_size,
            });
        }
        segments
    }
}

// ── Storage ─────────────────────────────────────────────────────────

/// Whole-file reads through `sceIo`.
pub struct FileStorage;

impl Storage for FileStorage {
    fn read(&self, path: &str, max_len: usize) -> Result<Vec<u8>, IoError> {
        let sce = |e: psp::io::IoError| IoError(e.code());
        let file = File::open(path, IoOpenFlags::RD_ONLY).map_err(sce)?;
        let size = file.size().map_err(sce)?;
        let size = usize::try_from(size).map_err(|_| IoError::FILE_TOO_LARGE)?;
        ra2d::io::check_len(size, max_len)?;
        let mut data = alloc::vec![0u8; size];
        let read = file.read_all(&mut data).map_err(sce)?;
        data.truncate(read);
        Ok(data)
    }
}
