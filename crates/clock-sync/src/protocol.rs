//! JSON wire format of the clock sync services
//!
//! Requests are `{"method": <name>, "params": {...}}`; responses are
//! `{"status": <code>, "result": <string>}` where status `0` is success and any
//! other value is an [`Error::code`]. Timestamps travel as decimal strings.

use serde::{Deserialize, Serialize};
use tempo_core::{Error, Result, Timestamp};
use tempo_ports::{ClockEventId, ClockEventMask};

/// Service served by the timing master
pub const MASTER_SERVICE: &str = "clock_sync_master";

/// Service served by every slave
pub const SLAVE_SERVICE: &str = "clock_sync_slave";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ClockSyncRequest {
    #[serde(rename = "registerSyncSlave")]
    RegisterSyncSlave {
        event_mask: ClockEventMask,
        participant_name: String,
    },

    #[serde(rename = "unregisterSyncSlave")]
    UnregisterSyncSlave { participant_name: String },

    #[serde(rename = "slaveSyncedEvent")]
    SlaveSyncedEvent {
        participant_name: String,
        #[serde(with = "decimal_time")]
        ack: Timestamp,
    },

    #[serde(rename = "getMasterTime")]
    GetMasterTime,

    #[serde(rename = "getMasterType")]
    GetMasterType,

    #[serde(rename = "syncTimeEvent")]
    SyncTimeEvent {
        event_id: ClockEventId,
        #[serde(with = "decimal_time")]
        new_time: Timestamp,
        #[serde(with = "decimal_time")]
        old_time: Timestamp,
    },
}

impl ClockSyncRequest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Failed(format!("failed to encode request: {e}")))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidArg(format!("malformed clock sync request: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSyncResponse {
    pub status: i32,
    #[serde(default)]
    pub result: String,
}

impl ClockSyncResponse {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            status: 0,
            result: result.into(),
        }
    }

    pub fn error(error: &Error) -> Self {
        Self {
            status: error.code(),
            result: error.message().to_string(),
        }
    }

    pub fn from_result(result: Result<String>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::error(&e),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":6,"result":"failed to encode response"}"#.to_string())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidArg(format!("malformed clock sync response: {e}")))
    }

    /// The result payload, or the error the status encodes
    pub fn into_result(self) -> Result<String> {
        if self.status == 0 {
            Ok(self.result)
        } else {
            Err(Error::from_code(self.status, self.result))
        }
    }
}

pub fn format_time(time: Timestamp) -> String {
    time.as_nanos().to_string()
}

pub fn parse_time(text: &str) -> Result<Timestamp> {
    Timestamp::parse_nanos(text)
        .ok_or_else(|| Error::InvalidArg(format!("'{text}' is not a nanosecond timestamp")))
}

mod decimal_time {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use tempo_core::Timestamp;

    pub fn serialize<S: Serializer>(time: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse_nanos(&text)
            .ok_or_else(|| de::Error::custom(format!("'{text}' is not a nanosecond timestamp")))
    }
}
