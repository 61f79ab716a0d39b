//! # Standard messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Common header for stamped messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Frame in which the message's data is expressed
    pub frame_id: String,

    /// UTC timestamp at which the message was created
    #[serde(with = "ts_milliseconds")]
    pub stamp: DateTime<Utc>,
}

/// A single boolean value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bool {
    pub data: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Header {
    /// Create a new header in the given frame stamped with the current time.
    pub fn now(frame_id: &str) -> Self {
        Self {
            frame_id: String::from(frame_id),
            stamp: Utc::now(),
        }
    }
}
