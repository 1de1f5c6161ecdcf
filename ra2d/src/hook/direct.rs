use alloc::vec::Vec;

use super::{
    EntryPoint, HookError, HookRecord, HookState, HookStrategy, Platform, TextSegment,
    build_trampoline, write_jump,
};
use crate::mips::{JR_RA, NOP, WORD};

/// In-place relocation of emulator import stubs.
///
/// The stub `jr $ra; syscall N` is copied into `[jr $ra, syscall N, jr $ra]`
/// and overwritten with `j wrapper; nop`. The emulator gives every module
/// its own copy of the stub, so each registered text segment is scanned for
/// the same two words and those copies are redirected as well.
#[derive(Debug, Default)]
pub struct Direct {
    scan_targets: Vec<TextSegment>,
}

impl Direct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses in the registered segments holding `pattern`, excluding
    /// those in `skip`.
    fn find_copies(&self, platform: &dyn Platform, pattern: [u32; 2], skip: &[u32]) -> Vec<u32> {
        let mut found = Vec::new();
        for segment in &self.scan_targets {
            // Only whole, aligned word pairs inside the segment; a segment
            // running past the address space is not scanned at all.
            let (Some(end), Some(mut addr)) = (
                segment.base.checked_add(segment.size),
                segment.base.checked_next_multiple_of(WORD),
            ) else {
                continue;
            };
            while addr.checked_add(2 * WORD).is_some_and(|pair_end| pair_end <= end) {
                if !skip.contains(&addr)
                    && platform.read_word(addr) == pattern[0]
                    && platform.read_word(addr + WORD) == pattern[1]
                {
                    found.push(addr);
                    // the second word cannot start another copy
                    addr += 2 * WORD;
                } else {
                    addr += WORD;
                }
            }
        }
        found
    }
}

impl HookStrategy for Direct {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn requires_elevation(&self) -> bool {
        false
    }

    fn register_scan_targets(&mut self, segments: Vec<TextSegment>) {
        self.scan_targets.extend(segments);
    }

    fn prepare(
        &mut self,
        platform: &mut dyn Platform,
        entry: EntryPoint,
        address: u32,
    ) -> Result<HookRecord, HookError> {
        let head = platform.read_word(address);
        if head == NOP && platform.read_word(address + WORD) == NOP {
            // An unlinked stub would match every empty word during the scan.
            return Err(HookError::UnsupportedInstruction {
                address,
                word: head,
            });
        }
        let (saved, trampoline) =
            build_trampoline(platform, address, |[w0, w1]| [w0, w1, JR_RA])?;
        Ok(HookRecord {
            entry,
            address,
            target: address,
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
        let copies = self.find_copies(
            platform,
            record.saved,
            &[record.address, record.trampoline],
        );
        write_jump(platform, record.address, wrapper);
        record.sites.push(record.address);
        for site in copies {
            write_jump(platform, site, wrapper);
            record.sites.push(site);
        }
        Ok(())
    }
}
