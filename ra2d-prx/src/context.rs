//! `$k1` juggling for wrappers reached through a syscall.
//!
//! A syscall leaves the caller's `$k1` in place, so kernel functions called
//! from the wrapper would treat the call as coming from user mode and reject
//! kernel buffers. Clearing it around the original call is what
//! `pspSdkSetK1(0)` does in C plugins.

use ra2d::wrapper::ContextOps;

core::arch::global_asm!(include_str!("k1.S"));

unsafe extern "C" {
    fn ra2d_set_k1(k1: u32) -> u32;
}

fn elevate() -> u32 {
    // SAFETY: only swaps a register; the previous value is handed back.
    unsafe { ra2d_set_k1(0) }
}

fn restore(saved: u32) {
    // SAFETY: `saved` came from `elevate` on this thread.
    unsafe {
        ra2d_set_k1(saved);
    }
}

/// Clear `$k1` for the duration of the original call.
pub const K1: ContextOps = ContextOps {
    acquire: elevate,
    release: restore,
};
