use chrono::NaiveDate;
use thiserror::Error;

/// A habit configuration that cannot be evaluated. Raised when a habit is
/// constructed or decoded, never by the evaluation functions themselves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HabitConfigError {
    #[error("daily target must be positive")]
    ZeroTarget,
    #[error("interval must be at least 2 days, got {0}")]
    IntervalTooShort(u32),
    #[error("`{field}` is required for {kind} habits")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("`{field}` must be absent for {kind} habits")]
    UnexpectedField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("unknown recurrence kind `{0}`")]
    UnknownKind(String),
    #[error("specific-weekday habits need at least one scheduled weekday")]
    NoScheduledWeekdays,
    #[error("weekday {0} is out of range (expected 0-6)")]
    WeekdayOutOfRange(u32),
    #[error("target for weekday {0} must be positive")]
    ZeroWeekdayTarget(u32),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("unknown habit `{0}`")]
    UnknownHabit(String),
    #[error("habit `{0}` is already registered")]
    DuplicateHabit(String),
    #[error("count {count} exceeds the target of {target} on {date}")]
    ExceedsTarget {
        date: NaiveDate,
        count: u32,
        target: u32,
    },
    #[error("{0} already has progress logged and cannot be skipped")]
    SkipWithProgress(NaiveDate),
    #[error("invalid habit configuration: {0}")]
    Config(#[from] HabitConfigError),
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot could not be decoded: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
