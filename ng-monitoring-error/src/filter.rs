use opcua::types::{FilterOperator, StatusCode};
use thiserror::Error;

/// Failures raised while validating or evaluating a content filter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Operator is recognised but not implemented by the evaluator.
    #[error("filter operator {0:?} unsupported")]
    OperatorUnsupported(FilterOperator),
    /// Element carries fewer operands than its operator needs.
    #[error("filter operand count mismatch for {operator:?}: expected at least {expected}, got {actual}")]
    OperandCountMismatch {
        operator: FilterOperator,
        expected: usize,
        actual: usize,
    },
    /// Operand cannot be used here (bad element index, attribute operand, ...).
    #[error("filter operand invalid: {0}")]
    OperandInvalid(String),
    #[error("event filter invalid: {0}")]
    EventFilterInvalid(String),
    /// Where clause evaluated to something other than a boolean.
    #[error("content filter invalid: {0}")]
    ContentFilterInvalid(String),
}

impl FilterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FilterError::OperatorUnsupported(_) => StatusCode::BadFilterOperatorUnsupported,
            FilterError::OperandCountMismatch { .. } => StatusCode::BadFilterOperandCountMismatch,
            FilterError::OperandInvalid(_) => StatusCode::BadFilterOperandInvalid,
            FilterError::EventFilterInvalid(_) => StatusCode::BadEventFilterInvalid,
            FilterError::ContentFilterInvalid(_) => StatusCode::BadContentFilterInvalid,
        }
    }
}
