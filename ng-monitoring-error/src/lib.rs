pub mod filter;

use anyhow::Error as AnyhowError;
use config::ConfigError;
use opcua::types::StatusCode;
use thiserror::Error;

pub use filter::FilterError;

pub type MonitoringResult<T, E = MonitoringError> = anyhow::Result<T, E>;
pub type FilterResult<T, E = FilterError> = Result<T, E>;

/// Service-level failures of the monitoring core.
///
/// Per-item outcomes are reported as `StatusCode`s inside batch results and
/// never surface through this type.
#[derive(Error, Debug, Default)]
pub enum MonitoringError {
    /// Request carried an empty batch.
    #[error("nothing to do")]
    #[default]
    NothingToDo,
    #[error("too many operations: requested {requested}, max {max}")]
    TooManyOperations { requested: usize, max: usize },
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Server answered the service call with a bad service result.
    #[error("service fault: {0}")]
    Service(StatusCode),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Filter(#[from] FilterError),
    #[error("{0}")]
    ConfigError(#[from] ConfigError),
    #[error("{0}")]
    Anyhow(#[from] AnyhowError),
}

impl MonitoringError {
    /// Wire status code reported for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MonitoringError::NothingToDo => StatusCode::BadNothingToDo,
            MonitoringError::TooManyOperations { .. } => StatusCode::BadTooManyOperations,
            MonitoringError::InvalidState(_) => StatusCode::BadInternalError,
            MonitoringError::Service(status) => *status,
            MonitoringError::Transport(_) => StatusCode::BadCommunicationError,
            MonitoringError::Configuration(_) | MonitoringError::ConfigError(_) => {
                StatusCode::BadInternalError
            }
            MonitoringError::Filter(e) => e.status_code(),
            MonitoringError::Anyhow(_) => StatusCode::BadUnexpectedError,
        }
    }
}

impl From<StatusCode> for MonitoringError {
    #[inline]
    fn from(status: StatusCode) -> Self {
        MonitoringError::Service(status)
    }
}

impl From<String> for MonitoringError {
    #[inline]
    fn from(e: String) -> Self {
        MonitoringError::InvalidState(e)
    }
}

impl From<&str> for MonitoringError {
    #[inline]
    fn from(e: &str) -> Self {
        MonitoringError::InvalidState(e.to_string())
    }
}
