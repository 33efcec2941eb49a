//! Request priorities.
//!
//! Priorities live on a numeric band from [`FilePriority::MIN`] to
//! [`FilePriority::MAX`]. A numerically smaller value is serviced sooner. The
//! named levels split the band into six equal steps.

use std::fmt;

/// Priority of every command a stream submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilePriority(u32);

impl FilePriority {
    /// Lowest numeric value (serviced first).
    pub const MIN: u32 = 256;
    /// Highest numeric value (serviced last).
    pub const MAX: u32 = 1024;

    pub const HIGHEST: Self = Self::band(0);
    pub const HIGH: Self = Self::band(1);
    pub const ABOVE_NORMAL: Self = Self::band(2);
    pub const NORMAL: Self = Self::band(3);
    pub const BELOW_NORMAL: Self = Self::band(4);
    pub const LOW: Self = Self::band(5);
    pub const LOWEST: Self = Self::band(6);

    const fn band(step: u32) -> Self {
        Self((Self::MAX - Self::MIN) * step / 6 + Self::MIN)
    }

    /// Create a priority, clamping `value` into the band.
    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// The numeric value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Whether this priority is serviced before `other`.
    pub fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }
}

impl Default for FilePriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u32> for FilePriority {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for FilePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::HIGHEST => "highest",
            Self::HIGH => "high",
            Self::ABOVE_NORMAL => "above-normal",
            Self::NORMAL => "normal",
            Self::BELOW_NORMAL => "below-normal",
            Self::LOW => "low",
            Self::LOWEST => "lowest",
            _ => return write!(f, "{}", self.0),
        };
        write!(f, "{name} ({})", self.0)
    }
}
