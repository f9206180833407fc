use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Logical time in nanoseconds since the participant-defined epoch
///
/// `0` is the start/reset point of a clock. Timestamps are totally ordered and
/// only move backward through an explicit clock reset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

/// Signed nanosecond delta between two timestamps
///
/// Used for cycle times, start delays, runtime budgets and sync periods.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Duration(pub i64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros.saturating_mul(NANOS_PER_MICRO))
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Parse the decimal nanosecond representation used on the wire
    pub fn parse_nanos(text: &str) -> Option<Self> {
        text.trim().parse::<i64>().ok().map(Self)
    }
}

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Self(micros.saturating_mul(NANOS_PER_MICRO))
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Convert a wall-clock duration, saturating at `i64::MAX` nanoseconds
    pub fn from_std(duration: std::time::Duration) -> Self {
        Self(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Wall-clock equivalent for sleeping and waiting; negative deltas become zero
    pub fn to_std(self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.0.max(0) as u64)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign<Duration> for Timestamp {
    fn sub_assign(&mut self, rhs: Duration) {
        *self = *self - rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Duration {
        Duration(self.0.saturating_mul(rhs))
    }
}

impl Div<i64> for Duration {
    type Output = Duration;

    fn div(self, rhs: i64) -> Duration {
        Duration(self.0 / rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_constructors() {
        assert_eq!(Timestamp::from_millis(3).as_nanos(), 3_000_000);
        assert_eq!(Duration::from_micros(7).as_nanos(), 7_000);
        assert_eq!(Duration::from_millis(-2), Duration(-2_000_000));
    }

    #[test]
    fn test_arithmetic() {
        let t = Timestamp::from_millis(10) + Duration::from_millis(5);
        assert_eq!(t, Timestamp::from_millis(15));
        assert_eq!(t - Timestamp::from_millis(20), Duration::from_millis(-5));
        assert_eq!(Duration::from_millis(2) / 2, Duration::from_millis(1));
        assert_eq!(Duration::from_millis(3) * 4, Duration::from_millis(12));
    }

    #[test]
    fn test_saturation() {
        let t = Timestamp(i64::MAX) + Duration(10);
        assert_eq!(t, Timestamp(i64::MAX));
    }

    #[test]
    fn test_std_conversion_clamps_negative() {
        assert_eq!(Duration::from_millis(-4).to_std(), std::time::Duration::ZERO);
        assert_eq!(
            Duration::from_std(std::time::Duration::from_micros(12)),
            Duration::from_micros(12)
        );
    }

    #[test]
    fn test_parse_wire_format() {
        assert_eq!(Timestamp::parse_nanos("1500"), Some(Timestamp(1500)));
        assert_eq!(Timestamp::parse_nanos(" -3 "), Some(Timestamp(-3)));
        assert_eq!(Timestamp::parse_nanos("1.5"), None);
    }
}
