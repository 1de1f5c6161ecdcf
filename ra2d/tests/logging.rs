//! The global log sink. One test, since the sink is process-wide.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use ra2d::log::{self, LogSink};
use ra2d::{StartupOptions, dlog, start};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<String>>>);

impl LogSink for Capture {
    fn write_line(&mut self, line: &[u8]) {
        self.0
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(line).into_owned());
    }
}

/// Logs while being formatted.
struct Chatty;

impl core::fmt::Display for Chatty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        dlog!("inner");
        write!(f, "outer")
    }
}

#[test]
fn lines_reach_the_installed_sink() {
    // no sink: a no-op
    assert!(!log::is_enabled());
    dlog!("dropped {}", 1);

    let capture = Capture::default();
    log::install(Box::new(capture.clone()));
    assert!(log::is_enabled());

    dlog!("hooked {} at {:#010x}", "sceCtrlReadBufferPositive", 0x0880_4000u32);
    let long = "x".repeat(300);
    dlog!("{}", long);
    dlog!("{}", Chatty);

    start(
        SimPlatform::emulated(),
        &MemStorage::default(),
        &Modules::default(),
        &RecordingWrappers::default(),
        &StartupOptions::default(),
    );

    assert!(log::uninstall().is_some());
    dlog!("dropped again");

    let lines = capture.0.lock().unwrap().clone();
    assert_eq!(lines[0], "hooked sceCtrlReadBufferPositive at 0x08804000\n");
    assert_eq!(lines[1].len(), log::LINE_CAPACITY);
    assert!(lines[1].ends_with('\n'));
    assert_eq!(lines[2], "inner\n");
    assert_eq!(lines[3], "outer\n");
    assert!(lines.iter().all(|l| !l.contains("dropped")));
    assert!(
        lines
            .iter()
            .any(|l| l == "no mapping at ms0:/seplugins/ra2d/homebrew (I/O error 0x80010002), using defaults\n"),
        "{lines:?}"
    );
    assert_eq!(lines.last().unwrap(), "4 of 4 hooks installed\n");
}
