//! Digital button bits as reported in `SceCtrlData::buttons`.

use bitflags::bitflags;

bitflags! {
    /// Button mask of one controller sample.
    ///
    /// Bits not named here (HOME, HOLD, NOTE, ...) are carried through
    /// untouched by the converter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u32 {
        const SELECT = 0x0000_0001;
        const START = 0x0000_0008;
        const UP = 0x0000_0010;
        const RIGHT = 0x0000_0020;
        const DOWN = 0x0000_0040;
        const LEFT = 0x0000_0080;
        const LTRIGGER = 0x0000_0100;
        const RTRIGGER = 0x0000_0200;
        const TRIANGLE = 0x0000_1000;
        const CIRCLE = 0x0000_2000;
        const CROSS = 0x0000_4000;
        const SQUARE = 0x0000_8000;

        const _ = !0;
    }
}
