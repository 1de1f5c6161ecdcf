//! Kernel plugin: hooks the `sceCtrl` buffer polling functions so analog
//! stick deflection also produces digital button presses.
//!
//! Install as a game plugin, e.g. `ms0:/seplugins/ra2d.prx` listed in
//! `game.txt`. Per-title mappings go to `ms0:/seplugins/ra2d/<DISC_ID>`.

#![no_std]
#![no_main]
#![feature(asm_experimental_arch)]

extern crate alloc;

mod context;
mod platform;
mod sink;

use alloc::boxed::Box;

use ra2d::wrapper::GlobalWrappers;
use ra2d::{StartupOptions, dlog};

use platform::{FileStorage, LoadedModules, PspPlatform};

psp::module_kernel!("ra2d", 1, 0);

const LOG_PATH: &str = "ms0:/ra2d.log";

/// Let the game's own startup settle before patching.
const START_DELAY_US: u32 = 10_000;

static WRAPPERS: GlobalWrappers = GlobalWrappers::new(context::K1);

fn psp_main() {
    unsafe { psp::sys::sceCtrlSetSamplingMode(psp::sys::CtrlMode::Analog) };

    // Logging is best effort.
    if let Ok(sink) = sink::FileSink::open(LOG_PATH) {
        ra2d::log::install(Box::new(sink));
    }
    dlog!("ra2d started");

    // On hardware the kernel routine itself is patched, so modules started
    // later are covered without a start-module handler. The emulator scan
    // only needs the game's modules loaded, which this delay allows for.
    unsafe { psp::sys::sceKernelDelayThread(START_DELAY_US) };

    let report = ra2d::start(
        PspPlatform::new(),
        &FileStorage,
        &LoadedModules,
        &WRAPPERS,
        &StartupOptions::default(),
    );
    dlog!(
        "title {}, strategy {}",
        report.title_id.as_deref().unwrap_or("-"),
        report.engine.as_ref().map_or("none", |e| e.strategy_name())
    );
}
