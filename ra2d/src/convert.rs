//! Analog deflection to digital button conversion.
//!
//! A digital button cannot express "half pressed", so deflection is turned
//! into a duty cycle: time is cut into periods of `window` samples and the
//! button is asserted during a share of each period that grows with the
//! deflection. Past the inner deadzone the share starts at one sample per
//! period; at the outer deadzone it reaches the whole period.
//!
//! Everything here is a pure function of its inputs. The sample timestamp is
//! the only notion of time, so identical samples always convert identically.

use crate::mapping::{AxisMapping, Direction};
use crate::sample::{CtrlData, Stick, deflection};
use crate::settings::Settings;

/// Largest magnitude of a stick deflection.
pub const MAX_DEFLECTION: u32 = 127;

/// Sense of the button bits of a polling function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// A set bit means pressed (`*BufferPositive`).
    Positive,
    /// A set bit means released (`*BufferNegative`).
    Negative,
}

impl Polarity {
    #[inline]
    fn flip(self, buttons: u32) -> u32 {
        match self {
            Self::Positive => buttons,
            Self::Negative => !buttons,
        }
    }
}

/// Inner and outer deadzone, both in `0..=127`.
///
/// Deflection below `inner` never asserts. Deflection within `outer` of the
/// rim asserts on every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadzoneConfig {
    pub inner: u8,
    pub outer: u8,
}

impl DeadzoneConfig {
    pub const fn new(inner: u8, outer: u8) -> Self {
        Self { inner, outer }
    }

    /// Usable range between the two deadzones. Zero or less disables
    /// conversion.
    #[inline]
    pub const fn span(&self) -> i32 {
        MAX_DEFLECTION as i32 - self.outer as i32 - self.inner as i32
    }

    /// Whether this configuration can ever assert a button.
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.span() > 0
    }
}

impl Default for DeadzoneConfig {
    fn default() -> Self {
        Self::new(30, 10)
    }
}

/// Whether a button is asserted for deflection magnitude `value` at
/// `timestamp`.
///
/// `value` past the usable span is clamped to it. The decision depends on
/// `timestamp` only through `timestamp % window`, and the number of asserted
/// timestamps per period never decreases as `value` grows. A `window` of 0
/// behaves like 1, i.e. a plain threshold.
pub fn button_on(deadzone: &DeadzoneConfig, value: u32, timestamp: u32, window: u32) -> bool {
    if value == 0 || value < deadzone.inner as u32 {
        return false;
    }
    let span = deadzone.span();
    if span <= 0 {
        return false;
    }
    let max_val = span as u64;
    let value = (value as u64 - deadzone.inner as u64).min(max_val);
    let window = window.max(1) as u64;

    let slice = 1 + value * (window - 1) / max_val;
    let n = (timestamp as u64 % window) + 1;
    slice >= n
}

/// Conversion parameters captured by every wrapper binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    pub mapping: AxisMapping,
    pub deadzone: DeadzoneConfig,
    /// Duty-cycle period in samples.
    pub window: u32,
    pub stick: Stick,
}

impl Converter {
    pub fn new(mapping: AxisMapping, settings: &Settings) -> Self {
        Self {
            mapping,
            deadzone: settings.deadzone,
            window: settings.window,
            stick: settings.stick,
        }
    }

    /// Whether `direction` is asserted for a signed deflection `d`.
    #[inline]
    fn asserted(&self, direction: Direction, d: i32, timestamp: u32) -> bool {
        let matches = match direction {
            Direction::YNegative | Direction::XNegative => d < 0,
            Direction::YPositive | Direction::XPositive => d > 0,
        };
        matches && button_on(&self.deadzone, d.unsigned_abs(), timestamp, self.window)
    }

    /// Button bits synthesized for one sample, in positive sense.
    pub fn synthesize(&self, sample: &CtrlData) -> u32 {
        let (x, y) = self.stick.read(sample);
        let (rx, ry) = (deflection(x), deflection(y));
        let mut bits = 0;
        for direction in Direction::ALL {
            let d = match direction {
                Direction::YNegative | Direction::YPositive => ry,
                Direction::XNegative | Direction::XPositive => rx,
            };
            if self.asserted(direction, d, sample.timestamp) {
                bits |= self.mapping.bits(direction);
            }
        }
        bits
    }

    /// Add synthesized button presses to the first `count` samples.
    ///
    /// Pressed buttons are only ever added: in positive polarity bits are
    /// OR'd in, in negative polarity the mask is inverted around the OR so
    /// the stored sense is kept. Applying twice to the same raw samples
    /// changes nothing the second time. Does nothing when `count < 1`.
    pub fn apply_conversion(&self, samples: &mut [CtrlData], count: i32, polarity: Polarity) {
        if count < 1 {
            return;
        }
        let count = (count as usize).min(samples.len());
        for sample in &mut samples[..count] {
            let pressed = polarity.flip(sample.buttons) | self.synthesize(sample);
            sample.buttons = polarity.flip(pressed);
        }
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(AxisMapping::default(), &Settings::default())
    }
}
