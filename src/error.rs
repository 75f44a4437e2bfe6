use crate::types::SlotTime;
use chrono::NaiveDate;
use thiserror::Error;

/// Coarse classification callers use to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Persistence,
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' is malformed")]
    InvalidField { field: String },

    #[error("slot {date} {time} is not available")]
    SlotUnavailable { date: NaiveDate, time: SlotTime },

    #[error("slots on {date} are booked: {}", format_times(.times))]
    SlotInUse { date: NaiveDate, times: Vec<SlotTime> },

    #[error("template '{name}' already exists")]
    DuplicateTemplate { name: String },

    #[error("{resource} '{key}' not found")]
    NotFound { resource: &'static str, key: String },

    #[error("slots for {date} could not be saved: {reason}")]
    SlotPersist { date: NaiveDate, reason: String },

    #[error("storage failure: {0}")]
    Persistence(String),
}

fn format_times(times: &[SlotTime]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl SchedulingError {
    pub fn not_found(resource: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } | Self::InvalidField { .. } => ErrorKind::Validation,
            Self::SlotUnavailable { .. }
            | Self::SlotInUse { .. }
            | Self::DuplicateTemplate { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SlotPersist { .. } | Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Machine readable identifier, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::SlotUnavailable { .. } => "slot_unavailable",
            Self::SlotInUse { .. } => "slot_in_use",
            Self::DuplicateTemplate { .. } => "duplicate_template",
            Self::NotFound { .. } => "not_found",
            Self::SlotPersist { .. } => "slot_persist",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<diesel::result::Error> for SchedulingError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SchedulingError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Persistence("storage lock poisoned".into())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let time = SlotTime::from_hm(9, 0).unwrap();

        let unavailable = SchedulingError::SlotUnavailable { date, time };
        assert_eq!(unavailable.kind(), ErrorKind::Conflict);
        assert_eq!(unavailable.code(), "slot_unavailable");
        assert_eq!(unavailable.to_string(), "slot 2024-06-01 09:00 is not available");

        let in_use = SchedulingError::SlotInUse {
            date,
            times: vec![time, SlotTime::from_hm(10, 30).unwrap()],
        };
        assert_eq!(in_use.kind(), ErrorKind::Conflict);
        assert_eq!(in_use.to_string(), "slots on 2024-06-01 are booked: 09:00, 10:30");

        let missing = SchedulingError::MissingField { field: "service" };
        assert_eq!(missing.kind(), ErrorKind::Validation);

        let not_found = SchedulingError::not_found("template", "morning");
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.to_string(), "template 'morning' not found");

        let persistence: SchedulingError = diesel::result::Error::NotFound.into();
        assert_eq!(persistence.kind(), ErrorKind::Persistence);
    }
}
