mod time;

pub use time::{Duration, Timestamp};
