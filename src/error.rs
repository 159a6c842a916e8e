use crate::conflict_checker::ConflictResult;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a proposed appointment window was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRange,
    Overlap,
    MalformedInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("malformed {field}: {value:?}")]
    MalformedInput { field: &'static str, value: String },
}

impl SchedulingError {
    pub fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failed write against a [`crate::backend::CrmBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0}")]
    NotFound(String),
    /// The write would leave an inverted window or two active bookings
    /// overlapping. Nothing was stored.
    #[error("appointment window rejected")]
    Rejected(ConflictResult),
    #[error("{0}")]
    Storage(String),
}

impl From<String> for BackendError {
    fn from(err: String) -> Self {
        BackendError::Storage(err)
    }
}
