//! Analog-to-digital control remapping for PSP games.
//!
//! `ra2d` hooks the four `sceCtrl` buffer polling functions and rewrites the
//! samples they return: deflection of an analog stick is turned into
//! synthesized digital button presses, so games without analog support can
//! be played with the stick.
//!
//! The crate is split along the path a sample takes:
//!
//! - [`resolver`] and [`settings`] build the immutable per-title
//!   [`AxisMapping`](mapping::AxisMapping) and converter settings at startup.
//! - [`convert`] is the pure deadzone + duty-cycle conversion.
//! - [`hook`] installs trampolines over the polling entry points through
//!   host-provided capabilities.
//! - [`wrapper`] holds the hot-path functions the entry points are redirected
//!   to.
//! - [`startup`] wires everything together once.
//!
//! Nothing here calls PSP syscalls directly. The firmware is reached through
//! the capability traits in [`hook`], [`io`] and [`log`], implemented by the
//! `ra2d-prx` module on hardware and by simulated hosts in tests.

#![no_std]

extern crate alloc;

#[macro_use]
pub mod log;

pub mod buttons;
pub mod convert;
pub mod hook;
pub mod io;
pub mod mapping;
pub mod mips;
pub mod resolver;
pub mod sample;
pub mod settings;
pub mod sfo;
pub mod startup;
pub mod wrapper;

pub use buttons::Buttons;
pub use convert::{Converter, DeadzoneConfig, Polarity, button_on};
pub use hook::{EntryPoint, HookError, HookHandle, HookState, InterceptionEngine};
pub use mapping::{AxisMapping, Button, Direction};
pub use sample::{CtrlData, Stick};
pub use startup::{StartupOptions, StartupReport, start};
