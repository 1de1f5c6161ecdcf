//! Hot-path replacements for the polling functions.
//!
//! Each hooked entry point jumps to one of the `extern "C"` wrappers below.
//! A wrapper looks up its [`Binding`] (written once during startup, before
//! the hook is committed), runs the original through the trampoline, lets
//! the [`Converter`] add synthesized presses and returns the original
//! result. No allocation, no locking, no I/O.

use core::sync::atomic::{AtomicU32, Ordering};

use spin::Once;

use crate::convert::{Converter, Polarity};
use crate::hook::{EntryPoint, HookError, HookHandle};
use crate::sample::CtrlData;

/// ABI of the four polling functions.
pub type PollFn = unsafe extern "C" fn(*mut CtrlData, i32) -> i32;

// ── Elevated context ────────────────────────────────────────────────

/// Raise and lower the privilege level around the original call.
///
/// On the PSP this saves `$k1` and clears it (`pspSdkSetK1(0)`), then puts
/// the saved value back.
#[derive(Clone, Copy)]
pub struct ContextOps {
    pub acquire: fn() -> u32,
    pub release: fn(u32),
}

impl core::fmt::Debug for ContextOps {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ContextOps")
    }
}

/// Elevated privilege for the lifetime of the guard.
pub struct ElevatedContext {
    saved: u32,
    release: fn(u32),
}

impl ElevatedContext {
    #[inline]
    pub fn acquire(ops: ContextOps) -> Self {
        Self {
            saved: (ops.acquire)(),
            release: ops.release,
        }
    }
}

impl Drop for ElevatedContext {
    #[inline]
    fn drop(&mut self) {
        (self.release)(self.saved);
    }
}

// ── Binding ─────────────────────────────────────────────────────────

/// Everything a wrapper needs, captured by value at startup.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub original: PollFn,
    pub converter: Converter,
    pub polarity: Polarity,
    /// Set when the active strategy requires elevation.
    pub context: Option<ContextOps>,
}

impl Binding {
    /// Run the original and convert what it returned.
    ///
    /// # Safety
    ///
    /// `pad` must be valid for `count` samples as required by the original
    /// function, and `original` must be callable with the polling ABI.
    #[inline]
    pub unsafe fn dispatch(&self, pad: *mut CtrlData, count: i32) -> i32 {
        let res = {
            let _context = self.context.map(ElevatedContext::acquire);
            // SAFETY: forwarded caller contract.
            unsafe { (self.original)(pad, count) }
        };
        if res > 0 && !pad.is_null() {
            // SAFETY: the original filled `res` samples, at most `count`.
            let samples =
                unsafe { core::slice::from_raw_parts_mut(pad, res.min(count.max(0)) as usize) };
            self.converter.apply_conversion(samples, res, self.polarity);
        }
        res
    }
}

// ── Global slots ────────────────────────────────────────────────────

static SLOTS: [Once<Binding>; 4] = [Once::new(), Once::new(), Once::new(), Once::new()];

/// Calls that reached an unbound wrapper.
static UNBOUND_CALLS: AtomicU32 = AtomicU32::new(0);

#[inline]
unsafe fn dispatch(entry: EntryPoint, pad: *mut CtrlData, count: i32) -> i32 {
    match SLOTS[entry.index()].get() {
        // SAFETY: the caller upholds the polling ABI.
        Some(binding) => unsafe { binding.dispatch(pad, count) },
        None => {
            // Hooks are committed only after binding.
            UNBOUND_CALLS.fetch_add(1, Ordering::Relaxed);
            0
        },
    }
}

macro_rules! poll_wrappers {
    ($($entry:ident),* $(,)?) => {
        paste::paste! {
            $(
                #[doc = "Replacement for `sceCtrl" $entry "`."]
                ///
                /// # Safety
                ///
                /// Same contract as the firmware function.
                pub unsafe extern "C" fn [<ra2d_ $entry:snake>](pad: *mut CtrlData, count: i32) -> i32 {
                    unsafe { dispatch(EntryPoint::$entry, pad, count) }
                }
            )*

            /// The wrapper installed for `entry`.
            pub fn wrapper_for(entry: EntryPoint) -> PollFn {
                match entry {
                    $(EntryPoint::$entry => [<ra2d_ $entry:snake>],)*
                }
            }
        }
    };
}

poll_wrappers!(
    ReadBufferPositive,
    ReadBufferNegative,
    PeekBufferPositive,
    PeekBufferNegative,
);

/// Number of calls that found their wrapper unbound.
pub fn unbound_calls() -> u32 {
    UNBOUND_CALLS.load(Ordering::Relaxed)
}

// ── WrapperSet ──────────────────────────────────────────────────────

/// The wrappers startup redirects entry points to.
pub trait WrapperSet {
    /// Address the hook for `entry` jumps to.
    fn address(&self, entry: EntryPoint) -> u32;

    /// Make the wrapper for `handle.entry` call its trampoline and convert
    /// with `converter`. Called before the hook is committed.
    fn bind(&self, handle: &HookHandle, converter: Converter) -> Result<(), HookError>;
}

/// The `extern "C"` wrappers of this module, bound through write-once
/// global slots.
#[derive(Debug, Clone, Copy)]
pub struct GlobalWrappers {
    context: ContextOps,
}

impl GlobalWrappers {
    /// `context` is used for hooks that require elevation.
    pub const fn new(context: ContextOps) -> Self {
        Self { context }
    }

    /// Bind `entry` to an explicit original.
    ///
    /// Fails with [`HookError::AlreadyInstalled`] if the slot is taken.
    pub fn bind_original(
        &self,
        entry: EntryPoint,
        original: PollFn,
        converter: Converter,
        elevate: bool,
    ) -> Result<(), HookError> {
        let binding = Binding {
            original,
            converter,
            polarity: entry.polarity(),
            context: elevate.then_some(self.context),
        };
        let slot = &SLOTS[entry.index()];
        if slot.is_completed() {
            return Err(HookError::AlreadyInstalled);
        }
        let _ = slot.call_once(|| binding);
        Ok(())
    }

    /// Whether `entry` has been bound.
    pub fn is_bound(entry: EntryPoint) -> bool {
        SLOTS[entry.index()].is_completed()
    }
}

impl WrapperSet for GlobalWrappers {
    fn address(&self, entry: EntryPoint) -> u32 {
        wrapper_for(entry) as usize as u32
    }

    fn bind(&self, handle: &HookHandle, converter: Converter) -> Result<(), HookError> {
        if handle.trampoline == 0 {
            return Err(HookError::UnresolvedAddress);
        }
        // SAFETY: the engine wrote a complete trampoline at this address.
        let original: PollFn =
            unsafe { core::mem::transmute::<usize, PollFn>(handle.trampoline as usize) };
        self.bind_original(handle.entry, original, converter, handle.requires_elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::Buttons;
    use crate::sample::Stick;
    use core::sync::atomic::AtomicI32;

    static DEPTH: AtomicI32 = AtomicI32::new(0);
    static MAX_DEPTH_SEEN_BY_ORIGINAL: AtomicI32 = AtomicI32::new(0);

    fn raise() -> u32 {
        DEPTH.fetch_add(1, Ordering::SeqCst);
        0x7
    }

    fn lower(saved: u32) {
        assert_eq!(saved, 0x7);
        DEPTH.fetch_sub(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn fill_pushed_up(pad: *mut CtrlData, count: i32) -> i32 {
        MAX_DEPTH_SEEN_BY_ORIGINAL.fetch_max(DEPTH.load(Ordering::SeqCst), Ordering::SeqCst);
        let n = count.min(2);
        for i in 0..n as usize {
            unsafe {
                *pad.add(i) = CtrlData {
                    lx: 128,
                    ly: 0,
                    ..CtrlData::default()
                };
            }
        }
        n
    }

    unsafe extern "C" fn fail(_pad: *mut CtrlData, _count: i32) -> i32 {
        -0x7FFF_FFFF
    }

    fn binding(original: PollFn, context: Option<ContextOps>) -> Binding {
        Binding {
            original,
            converter: Converter {
                stick: Stick::Left,
                ..Converter::default()
            },
            polarity: Polarity::Positive,
            context,
        }
    }

    #[test]
    fn dispatch_returns_original_count_and_converts() {
        let b = binding(fill_pushed_up, None);
        let mut buf = [CtrlData::default(); 4];
        let n = unsafe { b.dispatch(buf.as_mut_ptr(), 4) };
        assert_eq!(n, 2);
        assert_eq!(buf[0].buttons, Buttons::UP.bits());
        assert_eq!(buf[1].buttons, Buttons::UP.bits());
        assert_eq!(buf[2].buttons, 0);
    }

    #[test]
    fn context_is_held_for_the_call_and_released_on_error() {
        let ops = ContextOps {
            acquire: raise,
            release: lower,
        };
        let b = binding(fill_pushed_up, Some(ops));
        let mut buf = [CtrlData::default(); 1];
        unsafe { b.dispatch(buf.as_mut_ptr(), 1) };
        assert_eq!(MAX_DEPTH_SEEN_BY_ORIGINAL.load(Ordering::SeqCst), 1);
        assert_eq!(DEPTH.load(Ordering::SeqCst), 0);

        let b = binding(fail, Some(ops));
        let n = unsafe { b.dispatch(buf.as_mut_ptr(), 1) };
        assert_eq!(n, -0x7FFF_FFFF);
        assert_eq!(DEPTH.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn wrappers_are_distinct() {
        let addrs = EntryPoint::ALL.map(|e| wrapper_for(e) as usize);
        for i in 0..4 {
            for j in i + 1..4 {
                assert_ne!(addrs[i], addrs[j]);
            }
        }
    }
}
