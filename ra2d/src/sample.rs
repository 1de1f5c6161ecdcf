//! Controller sample layout shared with the firmware.

/// Analog stick center value.
pub const STICK_CENTER: u8 = 128;

/// One controller sample, laid out exactly like the firmware's `SceCtrlData`.
///
/// The polling functions fill a caller-provided array of these; the wrappers
/// rewrite `buttons` in place.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlData {
    /// Sample time in microseconds.
    pub timestamp: u32,
    /// Button mask, see [`Buttons`](crate::Buttons).
    pub buttons: u32,
    /// Left stick X (0..=255, 128 is center).
    pub lx: u8,
    /// Left stick Y (0..=255, 128 is center).
    pub ly: u8,
    /// Reserved on the PSP. The PS Vita's PSP emulator reports the right
    /// stick in bytes 0 and 1.
    pub rsrv: [u8; 6],
}

impl Default for CtrlData {
    fn default() -> Self {
        Self {
            timestamp: 0,
            buttons: 0,
            lx: STICK_CENTER,
            ly: STICK_CENTER,
            rsrv: [STICK_CENTER, STICK_CENTER, 0, 0, 0, 0],
        }
    }
}

const _: () = assert!(core::mem::size_of::<CtrlData>() == 16);

/// Which stick drives the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stick {
    /// The PSP's own analog stick (`lx`, `ly`).
    Left,
    /// The second stick (`rsrv[0]`, `rsrv[1]`).
    #[default]
    Right,
}

impl Stick {
    /// Raw `(x, y)` of this stick in `sample`.
    #[inline]
    pub fn read(self, sample: &CtrlData) -> (u8, u8) {
        match self {
            Self::Left => (sample.lx, sample.ly),
            Self::Right => (sample.rsrv[0], sample.rsrv[1]),
        }
    }

    /// Parse a settings value (`left` or `right`).
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("left") {
            Some(Self::Left)
        } else if name.eq_ignore_ascii_case("right") {
            Some(Self::Right)
        } else {
            None
        }
    }
}

/// Signed deflection of a raw axis value, in `-127..=127`.
///
/// A raw 0 maps to -127 rather than -128 so magnitudes stay within the
/// converter's 0..=127 range.
#[inline]
pub fn deflection(raw: u8) -> i32 {
    (raw as i32 - STICK_CENTER as i32).max(-127)
}
