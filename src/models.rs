use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Domain Models
// ============================================================================

/// Identifies one device registry (a group of devices)
pub type GroupId = String;

/// Identifies one device within its group
pub type DeviceId = String;

/// Caller-supplied correlation id, echoed back unchanged in replies
pub type RequestId = u64;

/// The state of one device as seen by a group query
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    /// Last value recorded by the device
    Value(f64),
    /// Never recorded, timed out, or the device is gone
    Unavailable,
}

impl Reading {
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Value(_))
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::Unavailable,
        }
    }
}

/// Result of one completed group query: every device in the query's snapshot
/// mapped to exactly one reading
pub type QueryOutcome = HashMap<DeviceId, Reading>;

/// Why a device resolved to `Reading::Unavailable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnavailableReason {
    /// The device answered but has never recorded a value
    NoReading,
    /// The device stopped before it could answer
    Terminated,
    /// The query deadline passed first
    Timeout,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::NoReading => "no_reading",
            UnavailableReason::Terminated => "terminated",
            UnavailableReason::Timeout => "timeout",
        }
    }
}
