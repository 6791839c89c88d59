use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Start and optional end of an activity, in Unix milliseconds.
///
/// With both set, listening/watching activities render a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    pub start: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
}

impl ActivityTimestamps {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// An open-ended activity starting now.
    pub fn from_now() -> Self {
        Self::from_system_time(SystemTime::now(), None)
    }

    pub fn from_system_time(start: SystemTime, end: Option<SystemTime>) -> Self {
        Self {
            start: unix_millis(start),
            end: end.map(unix_millis),
        }
    }
}

// Times before the epoch clamp to zero.
fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
