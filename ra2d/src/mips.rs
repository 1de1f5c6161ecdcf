//! The handful of MIPS encodings the hook engine writes or recognizes.

/// `nop` (`sll $zero, $zero, 0`).
pub const NOP: u32 = 0x0000_0000;

/// `jr $ra`.
pub const JR_RA: u32 = 0x03E0_0008;

const OP_J: u32 = 0x02;
const TARGET_MASK: u32 = 0x03FF_FFFF;

/// Size of one instruction in bytes.
pub const WORD: u32 = 4;

/// `j target`.
///
/// Only the low 28 bits of `target` are encoded; the jump lands in the
/// 256 MiB region of the jump's own delay slot.
#[inline]
pub const fn j(target: u32) -> u32 {
    (OP_J << 26) | ((target >> 2) & TARGET_MASK)
}

/// `syscall code`.
#[inline]
pub const fn syscall(code: u32) -> u32 {
    0x0000_000C | ((code & 0x000F_FFFF) << 6)
}

/// Whether `word` is a `j` instruction.
#[inline]
pub const fn is_j(word: u32) -> bool {
    word >> 26 == OP_J
}

/// Destination of the `j` instruction `word` located at `pc`.
#[inline]
pub const fn jump_target(pc: u32, word: u32) -> u32 {
    (pc.wrapping_add(WORD) & 0xF000_0000) | ((word & TARGET_MASK) << 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_jumps() {
        assert_eq!(j(0x0880_4000), 0x0A20_1000);
        // the kernel segment bit is dropped
        assert_eq!(j(0x8880_4000), 0x0A20_1000);
        assert!(is_j(j(0x0880_4000)));
        assert!(!is_j(JR_RA));
    }

    #[test]
    fn jump_target_keeps_region_of_pc() {
        assert_eq!(jump_target(0x8800_1000, j(0x0801_2340)), 0x8801_2340);
        assert_eq!(jump_target(0x0880_0000, j(0x0880_4000)), 0x0880_4000);
    }

    #[test]
    fn encodes_syscalls() {
        assert_eq!(syscall(0x2015), 0x0008_054C);
        assert_eq!(syscall(0), 0x0000_000C);
    }
}
