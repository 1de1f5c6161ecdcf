//! Property-based tests for the deadzone and duty-cycle conversion.

use proptest::prelude::*;
use ra2d::{
    AxisMapping, Button, Converter, CtrlData, DeadzoneConfig, Polarity, Stick, button_on,
};

const BUTTONS: [Button; 10] = [
    Button::Up,
    Button::Down,
    Button::Left,
    Button::Right,
    Button::LTrigger,
    Button::RTrigger,
    Button::Triangle,
    Button::Circle,
    Button::Cross,
    Button::Square,
];

fn slot() -> impl Strategy<Value = Option<Button>> {
    prop::option::of(prop::sample::select(BUTTONS.to_vec()))
}

fn deadzone() -> impl Strategy<Value = DeadzoneConfig> {
    (0u8..=127, 0u8..=127).prop_map(|(inner, outer)| DeadzoneConfig::new(inner, outer))
}

fn converter() -> impl Strategy<Value = Converter> {
    (
        (slot(), slot(), slot(), slot()),
        deadzone(),
        0u32..=255,
        prop_oneof![Just(Stick::Left), Just(Stick::Right)],
    )
        .prop_map(|((yn, yp, xn, xp), deadzone, window, stick)| Converter {
            mapping: AxisMapping::new(yn, yp, xn, xp),
            deadzone,
            window,
            stick,
        })
}

fn sample() -> impl Strategy<Value = CtrlData> {
    (any::<u32>(), any::<u32>(), any::<[u8; 4]>()).prop_map(|(timestamp, buttons, [lx, ly, rx, ry])| {
        CtrlData {
            timestamp,
            buttons,
            lx,
            ly,
            rsrv: [rx, ry, 0, 0, 0, 0],
        }
    })
}

fn samples() -> impl Strategy<Value = Vec<CtrlData>> {
    prop::collection::vec(sample(), 0..16)
}

fn polarity() -> impl Strategy<Value = Polarity> {
    prop_oneof![Just(Polarity::Positive), Just(Polarity::Negative)]
}

fn asserted_per_period(dz: &DeadzoneConfig, value: u32, window: u32) -> usize {
    (0..window.max(1))
        .filter(|&t| button_on(dz, value, t, window))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Converted samples keep every button the original reported pressed.
    #[test]
    fn prop_pressed_bits_survive(
        conv in converter(),
        original in samples(),
        sense in polarity(),
    ) {
        let mut converted = original.clone();
        let count = converted.len() as i32;
        conv.apply_conversion(&mut converted, count, sense);
        for (before, after) in original.iter().zip(&converted) {
            let (pressed_before, pressed_after) = match sense {
                Polarity::Positive => (before.buttons, after.buttons),
                Polarity::Negative => (!before.buttons, !after.buttons),
            };
            prop_assert_eq!(pressed_after & pressed_before, pressed_before);
            prop_assert_eq!((before.lx, before.ly, before.rsrv), (after.lx, after.ly, after.rsrv));
            prop_assert_eq!(before.timestamp, after.timestamp);
        }
    }

    /// A second pass over converted samples changes nothing.
    #[test]
    fn prop_idempotent(conv in converter(), original in samples(), sense in polarity()) {
        let count = original.len() as i32;
        let mut once = original.clone();
        conv.apply_conversion(&mut once, count, sense);
        let mut twice = once.clone();
        conv.apply_conversion(&mut twice, count, sense);
        prop_assert_eq!(once, twice);
    }

    /// A non-positive count leaves the buffer alone.
    #[test]
    fn prop_nonpositive_count(conv in converter(), original in samples(), count in i32::MIN..=0) {
        let mut converted = original.clone();
        conv.apply_conversion(&mut converted, count, Polarity::Positive);
        prop_assert_eq!(converted, original);
    }

    #[test]
    fn prop_zero_never_asserts(dz in deadzone(), t in any::<u32>(), window in any::<u32>()) {
        prop_assert!(!button_on(&dz, 0, t, window));
    }

    /// With no usable span left between the deadzones nothing ever asserts.
    #[test]
    fn prop_exhausted_span_disables(
        inner in 0u8..=127,
        value in any::<u32>(),
        t in any::<u32>(),
        window in 0u32..=255,
    ) {
        let dz = DeadzoneConfig::new(inner, 127 - inner);
        prop_assert!(!dz.is_enabled());
        prop_assert!(!button_on(&dz, value, t, window));
        let dz = DeadzoneConfig::new(127, inner);
        prop_assert!(!button_on(&dz, value, t, window));
    }

    /// The decision repeats every `window` timestamps.
    #[test]
    fn prop_periodic(
        dz in deadzone(),
        value in 0u32..=200,
        t in 0u32..u32::MAX - 512,
        window in 1u32..=255,
    ) {
        prop_assert_eq!(
            button_on(&dz, value, t, window),
            button_on(&dz, value, t + window, window)
        );
    }

    /// More deflection never asserts on fewer timestamps per period.
    #[test]
    fn prop_monotonic_in_value(
        dz in deadzone(),
        a in 0u32..=127,
        b in 0u32..=127,
        window in 1u32..=64,
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(asserted_per_period(&dz, lo, window) <= asserted_per_period(&dz, hi, window));
    }

    /// Past the outer deadzone every timestamp asserts.
    #[test]
    fn prop_full_deflection_saturates(dz in deadzone(), t in any::<u32>(), window in 1u32..=255) {
        prop_assume!(dz.is_enabled());
        prop_assert!(button_on(&dz, 127 - dz.outer as u32, t, window));
    }
}
