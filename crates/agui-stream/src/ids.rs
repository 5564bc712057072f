//! Typed identifiers for runs, threads and messages.
//!
//! Each id rejects empty values at construction and re-validates on
//! deserialization, so an event built from these ids always carries usable
//! identities.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::SequencerError;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates and wraps a raw id. Empty or whitespace-only values are rejected.
            pub fn parse(value: impl Into<String>) -> Result<Self, SequencerError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(SequencerError::Validation(format!(
                        "{} must not be empty",
                        $label
                    )));
                }
                Ok(Self(value))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = SequencerError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Caller-supplied identifier of one run.
    RunId,
    "run id"
);
typed_id!(
    /// Conversation thread a run belongs to.
    ThreadId,
    "thread id"
);
typed_id!(
    /// Identifier of one assistant message within a run.
    MessageId,
    "message id"
);

impl ThreadId {
    /// Synthesizes a time-derived thread id (`thread_<unix millis>`).
    pub fn generate() -> Self {
        Self(format!("thread_{}", unix_millis()))
    }
}

impl MessageId {
    /// Generates a fresh message id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Milliseconds since the UNIX epoch, saturating to zero on clock skew.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
