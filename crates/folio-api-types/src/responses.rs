use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Body returned by a successful profile update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileResponse {
    pub ok: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub message: String,
}

impl UpdateProfileResponse {
    pub fn success(timestamp: OffsetDateTime, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            timestamp,
            message: message.into(),
        }
    }
}

/// Body returned whenever the trigger endpoint refuses or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureResponse {
    pub ok: bool,
    pub error: String,
}

impl FailureResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
