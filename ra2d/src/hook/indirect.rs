use alloc::vec::Vec;

use super::{
    EntryPoint, HookError, HookRecord, HookState, HookStrategy, Platform, build_trampoline,
    write_jump,
};
use crate::mips::{self, JR_RA, WORD};

/// Relocation of the kernel routine behind a `j` import stub.
///
/// The routine's first two words move into `[w0, j routine+8, w1]`, with
/// `w1` in the delay slot of the jump back. The routine head becomes
/// `j stub; nop`, where the stub is `jr $ra; syscall N` and `N` is the
/// syscall number of the wrapper. Routing through a syscall lets the
/// wrapper run in the kernel module while the firmware's privilege checks
/// still see the original caller.
#[derive(Debug, Default)]
pub struct IndirectDispatch;

impl IndirectDispatch {
    pub fn new() -> Self {
        Self
    }

    /// Follow the `j` at `address`.
    fn resolve(platform: &dyn Platform, address: u32) -> Result<u32, HookError> {
        let word = platform.read_word(address);
        if !mips::is_j(word) {
            return Err(HookError::UnsupportedInstruction { address, word });
        }
        match mips::jump_target(address, word) {
            0 => Err(HookError::UnresolvedAddress),
            target => Ok(target),
        }
    }
}

impl HookStrategy for IndirectDispatch {
    fn name(&self) -> &'static str {
        "indirect-dispatch"
    }

    fn requires_elevation(&self) -> bool {
        true
    }

    fn prepare(
        &mut self,
        platform: &mut dyn Platform,
        entry: EntryPoint,
        address: u32,
    ) -> Result<HookRecord, HookError> {
        let target = Self::resolve(platform, address)?;
        let resume = target + 2 * WORD;
        let (saved, trampoline) =
            build_trampoline(platform, target, |[w0, w1]| [w0, mips::j(resume), w1])?;
        Ok(HookRecord {
            entry,
            address,
            target,
            saved,
            trampoline,
            sites: Vec::new(),
            state: HookState::Uninstalled,
        })
    }

    fn commit(
        &mut self,
        platform: &mut dyn Platform,
        record: &mut HookRecord,
        wrapper: u32,
    ) -> Result<(), HookError> {
        let code = platform.syscall_number(wrapper)?;
        let stub = platform.alloc_code(2)?;
        platform.write_word(stub, JR_RA);
        platform.write_word(stub + WORD, mips::syscall(code));
        write_jump(platform, record.target, stub);
        record.sites.push(record.target);
        Ok(())
    }
}
