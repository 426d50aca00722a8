use crate::types::{Instant, RecordId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Identity error: {0}")]
    Identity(#[from] uuid::Error),

    #[error("Fixture kind '{kind}' is not registered")]
    UnknownKind { kind: String },

    #[error("Fixture kind '{kind}' is already registered with a different shape")]
    DuplicateKind { kind: String },

    #[error("Invalid override for '{kind}.{attribute}': {reason}")]
    InvalidOverride {
        kind:      String,
        attribute: String,
        reason:    String,
    },

    /// Unbalanced freeze/unfreeze. Always a teardown bug in the caller.
    #[error("Clock state error: {operation} called with no active freeze")]
    ClockState { operation: &'static str },

    #[error("Calendar arithmetic overflow: {months} month(s) from {from}")]
    CalendarOverflow { from: Instant, months: u32 },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: Instant, end: Instant },

    #[error("Record {record} has no attribute '{attribute}'")]
    MissingAttribute { record: RecordId, attribute: String },

    #[error("Record {record} attribute '{attribute}' is not a {expected}")]
    AttributeType {
        record:    RecordId,
        attribute: String,
        expected:  &'static str,
    },

    #[error("Instant {at} cannot be stored as nanoseconds since the epoch")]
    TimestampOutOfRange { at: Instant },

    #[error("Scenario '{scenario}' failed: {message}")]
    AssertionFailed { scenario: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
