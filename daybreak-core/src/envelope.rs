//! JSON response envelope for handlers that serve cached data.
//!
//! Success bodies look like `{"success": true, "data": ..., "timestamp": ...}`
//! and failures like `{"success": false, "error": ..., "message": ...}`.

use std::fmt::Display;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

pub const STATUS_OK: u16 = 200;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Response body wrapping a payload or a failure description.
///
/// The `success` flag is not stored: it is written from the variant, and a
/// body whose flag disagrees with its shape is rejected on the way in.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success {
        data: T,
        timestamp: Timestamp,
    },
    Failure {
        /// Short, stable description of what failed (e.g. "Failed to fetch crypto data").
        error: String,
        /// The underlying error's message.
        message: String,
    },
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    data: &'a T,
    timestamp: &'a Timestamp,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    success: bool,
    error: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireBody<T> {
    Success {
        success: bool,
        data: T,
        timestamp: Timestamp,
    },
    Failure {
        success: bool,
        error: String,
        message: String,
    },
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { data, timestamp } => SuccessBody {
                success: true,
                data,
                timestamp,
            }
            .serialize(serializer),
            Self::Failure { error, message } => FailureBody {
                success: false,
                error,
                message,
            }
            .serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match WireBody::deserialize(deserializer)? {
            WireBody::Success {
                success: true,
                data,
                timestamp,
            } => Ok(Self::Success { data, timestamp }),
            WireBody::Failure {
                success: false,
                error,
                message,
            } => Ok(Self::Failure { error, message }),
            WireBody::Success { .. } => Err(de::Error::custom(
                "body carries data but \"success\" is false",
            )),
            WireBody::Failure { .. } => Err(de::Error::custom(
                "body carries an error but \"success\" is true",
            )),
        }
    }
}

impl<T> Envelope<T> {
    pub fn ok(data: T, timestamp: Timestamp) -> Self {
        Self::Success { data, timestamp }
    }

    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Wrap a handler result; `error_label` becomes the `error` field on failure.
    pub fn from_result<E: Display>(
        result: Result<T, E>,
        error_label: &str,
        timestamp: Timestamp,
    ) -> Self {
        match result {
            Ok(data) => Self::ok(data, timestamp),
            Err(e) => Self::failure(error_label, e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// HTTP status to send with this body.
    pub fn status_code(&self) -> u16 {
        if self.is_success() {
            STATUS_OK
        } else {
            STATUS_INTERNAL_ERROR
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }
}
