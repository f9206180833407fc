use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::sync::Weak;
use tempo_core::{Result, Timestamp};

/// How a clock advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockType {
    /// Time is derived by sampling (e.g. wall clock); only reset events are emitted
    Continuous,
    /// Time is advanced in explicit steps; update and reset events are emitted
    Discrete,
}

impl ClockType {
    /// Integer representation used by `getMasterType`
    pub fn as_i32(self) -> i32 {
        match self {
            ClockType::Continuous => 0,
            ClockType::Discrete => 1,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ClockType::Continuous),
            1 => Some(ClockType::Discrete),
            _ => None,
        }
    }
}

/// Observer of a clock's time changes
///
/// Continuous clocks only ever call the reset pair. Discrete clocks call all
/// five; `time_updating` is always sent for an update, the begin/end pair only
/// when the driver asks for it.
pub trait EventSink: Send + Sync {
    fn time_update_begin(&self, old_time: Timestamp, new_time: Timestamp);
    fn time_updating(&self, new_time: Timestamp);
    fn time_update_end(&self, new_time: Timestamp);
    fn time_reset_begin(&self, old_time: Timestamp, new_time: Timestamp);
    fn time_reset_end(&self, new_time: Timestamp);
}

/// Port for a named time source
///
/// Implementations hold the event sink only weakly: a sink that has been
/// dropped is skipped, never reported.
pub trait Clock: Send + Sync {
    fn name(&self) -> &str;

    fn clock_type(&self) -> ClockType;

    /// Current time according to this clock
    fn now(&self) -> Timestamp;

    /// Move the clock back to its reset point, emitting the reset pair
    fn reset(&self);

    /// Bind `sink`, mark the clock started and reset it
    fn start(&self, sink: Weak<dyn EventSink>) -> Result<()>;

    /// Release the sink; no events are emitted after this returns
    fn stop(&self) -> Result<()>;
}

/// Narrow view of "the" participant time used by the scheduler and clock sync
pub trait TimeSource: Send + Sync {
    fn time(&self) -> Timestamp;

    fn clock_type(&self) -> ClockType;
}

/// The five clock events, numbered as on the clock-sync wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ClockEventId {
    UpdateBegin = 1,
    Updating = 2,
    UpdateEnd = 3,
    ResetBegin = 4,
    ResetEnd = 5,
}

impl ClockEventId {
    pub const ALL: [ClockEventId; 5] = [
        ClockEventId::UpdateBegin,
        ClockEventId::Updating,
        ClockEventId::UpdateEnd,
        ClockEventId::ResetBegin,
        ClockEventId::ResetEnd,
    ];

    /// The single-bit mask selecting this event
    pub fn mask(self) -> ClockEventMask {
        ClockEventMask(1 << (self as u32 - 1))
    }
}

impl From<ClockEventId> for u32 {
    fn from(id: ClockEventId) -> u32 {
        id as u32
    }
}

impl TryFrom<u32> for ClockEventId {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(ClockEventId::UpdateBegin),
            2 => Ok(ClockEventId::Updating),
            3 => Ok(ClockEventId::UpdateEnd),
            4 => Ok(ClockEventId::ResetBegin),
            5 => Ok(ClockEventId::ResetEnd),
            other => Err(format!("unknown clock event id {other}")),
        }
    }
}

impl fmt::Display for ClockEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClockEventId::UpdateBegin => "time_update_begin",
            ClockEventId::Updating => "time_updating",
            ClockEventId::UpdateEnd => "time_update_end",
            ClockEventId::ResetBegin => "time_reset_begin",
            ClockEventId::ResetEnd => "time_reset_end",
        };
        f.write_str(name)
    }
}

/// Set of clock events a sync slave wants relayed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockEventMask(u32);

impl ClockEventMask {
    pub const NONE: ClockEventMask = ClockEventMask(0);
    pub const UPDATE_BEGIN: ClockEventMask = ClockEventMask(0x01);
    pub const UPDATING: ClockEventMask = ClockEventMask(0x02);
    pub const UPDATE_END: ClockEventMask = ClockEventMask(0x04);
    pub const RESET_BEGIN: ClockEventMask = ClockEventMask(0x08);
    pub const RESET_END: ClockEventMask = ClockEventMask(0x10);
    pub const ALL: ClockEventMask = ClockEventMask(0x1f);

    /// Build from wire bits; bits outside the five events are dropped
    pub fn from_bits(bits: u32) -> Self {
        ClockEventMask(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, event: ClockEventId) -> bool {
        self.0 & event.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: ClockEventMask) -> ClockEventMask {
        ClockEventMask(self.0 | other.0)
    }
}

impl BitOr for ClockEventMask {
    type Output = ClockEventMask;

    fn bitor(self, rhs: ClockEventMask) -> ClockEventMask {
        self.union(rhs)
    }
}
