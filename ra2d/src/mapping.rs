//! Axis direction to button mapping and its text file format.
//!
//! A mapping file holds exactly four tokens separated by spaces, tabs or
//! line breaks, in the order of [`Direction::ALL`]:
//!
//! ```text
//! cross circle
//! none square
//! ```
//!
//! Each token is one of the [`Button`] names or `none`.

use crate::buttons::Buttons;

/// One of the four half-axes of a stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Stick pushed up.
    YNegative,
    /// Stick pushed down.
    YPositive,
    /// Stick pushed left.
    XNegative,
    /// Stick pushed right.
    XPositive,
}

impl Direction {
    /// Token order of the mapping file.
    pub const ALL: [Self; 4] = [
        Self::YNegative,
        Self::YPositive,
        Self::XNegative,
        Self::XPositive,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::YNegative => "y-negative",
            Self::YPositive => "y-positive",
            Self::XNegative => "x-negative",
            Self::XPositive => "x-positive",
        }
    }
}

/// A button that a direction can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    LTrigger,
    RTrigger,
    Triangle,
    Circle,
    Cross,
    Square,
}

impl Button {
    const NAMES: [(&'static str, Self); 10] = [
        ("up", Self::Up),
        ("down", Self::Down),
        ("left", Self::Left),
        ("right", Self::Right),
        ("ltrigger", Self::LTrigger),
        ("rtrigger", Self::RTrigger),
        ("triangle", Self::Triangle),
        ("circle", Self::Circle),
        ("cross", Self::Cross),
        ("square", Self::Square),
    ];

    /// The button's bit in [`CtrlData::buttons`](crate::CtrlData::buttons).
    pub const fn bits(self) -> Buttons {
        match self {
            Self::Up => Buttons::UP,
            Self::Down => Buttons::DOWN,
            Self::Left => Buttons::LEFT,
            Self::Right => Buttons::RIGHT,
            Self::LTrigger => Buttons::LTRIGGER,
            Self::RTrigger => Buttons::RTRIGGER,
            Self::Triangle => Buttons::TRIANGLE,
            Self::Circle => Buttons::CIRCLE,
            Self::Cross => Buttons::CROSS,
            Self::Square => Buttons::SQUARE,
        }
    }

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }

    /// Look up a mapping file token.
    ///
    /// Returns `Some(None)` for `none`, `None` for an unknown token.
    pub fn from_token(token: &[u8]) -> Option<Option<Self>> {
        if token.eq_ignore_ascii_case(b"none") {
            return Some(None);
        }
        Self::NAMES
            .iter()
            .find(|(name, _)| token.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, b)| Some(*b))
    }
}

/// Immutable direction to button table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMapping {
    slots: [Option<Button>; 4],
}

impl AxisMapping {
    /// A mapping with every direction unmapped.
    pub const UNMAPPED: Self = Self { slots: [None; 4] };

    pub const fn new(
        y_negative: Option<Button>,
        y_positive: Option<Button>,
        x_negative: Option<Button>,
        x_positive: Option<Button>,
    ) -> Self {
        Self {
            slots: [y_negative, y_positive, x_negative, x_positive],
        }
    }

    #[inline]
    pub fn get(&self, direction: Direction) -> Option<Button> {
        self.slots[direction.index()]
    }

    /// Bits to set when `direction` is asserted (empty when unmapped).
    #[inline]
    pub fn bits(&self, direction: Direction) -> u32 {
        self.get(direction).map_or(0, |b| b.bits().bits())
    }

    /// Parse mapping file contents on top of `self`.
    ///
    /// A token count other than four applies nothing. An unknown token
    /// leaves its own direction unchanged and the other three are applied.
    pub fn parse(&self, contents: &[u8]) -> ParseOutcome {
        let mut tokens = contents
            .split(|&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .filter(|t| !t.is_empty());

        let mut found: [&[u8]; 4] = [&[]; 4];
        let mut count = 0;
        for token in tokens.by_ref().take(4) {
            found[count] = token;
            count += 1;
        }
        if count < 4 {
            return ParseOutcome {
                mapping: *self,
                problem: Some(MappingProblem::TokenCount(count)),
            };
        }
        let extra = tokens.count();
        if extra > 0 {
            return ParseOutcome {
                mapping: *self,
                problem: Some(MappingProblem::TokenCount(4 + extra)),
            };
        }

        let mut mapping = *self;
        let mut problem = None;
        for (direction, token) in Direction::ALL.into_iter().zip(found) {
            match Button::from_token(token) {
                Some(button) => mapping.slots[direction.index()] = button,
                // The slot keeps its previous value; the first offender is reported.
                None if problem.is_none() => {
                    problem = Some(MappingProblem::UnknownToken(direction));
                },
                None => {},
            }
        }
        ParseOutcome { mapping, problem }
    }
}

impl Default for AxisMapping {
    /// Stick directions mapped onto the d-pad.
    fn default() -> Self {
        Self::new(
            Some(Button::Up),
            Some(Button::Down),
            Some(Button::Left),
            Some(Button::Right),
        )
    }
}

/// Why a mapping file was considered malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingProblem {
    /// The file did not hold exactly four tokens. Nothing was applied.
    TokenCount(usize),
    /// The token for this direction is not in the vocabulary.
    UnknownToken(Direction),
}

impl core::fmt::Display for MappingProblem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TokenCount(n) => write!(f, "expected 4 tokens, found {n}"),
            Self::UnknownToken(d) => write!(f, "unknown button for {}", d.name()),
        }
    }
}

/// Result of [`AxisMapping::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOutcome {
    pub mapping: AxisMapping,
    pub problem: Option<MappingProblem>,
}
