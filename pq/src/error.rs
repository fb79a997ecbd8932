//! Error types delivered through queue tickets

use std::any::Any;
use thiserror::Error;

/// Why a submitted operation did not produce a value
#[derive(Debug, Error)]
pub enum OperationError<E> {
    /// The operation ran and returned its own error
    #[error("Operation failed: {0}")]
    Failure(E),

    /// The operation panicked while running
    #[error("Operation panicked: {reason}")]
    Panicked { reason: String },

    /// The result channel closed before the operation reported back
    #[error("Operation abandoned before completion")]
    Abandoned,
}

impl<E> OperationError<E> {
    /// Check if the operation itself reported the error
    pub fn is_failure(&self) -> bool {
        matches!(self, OperationError::Failure(_))
    }

    /// Take the operation's own error, if that is what this is
    pub fn into_failure(self) -> Option<E> {
        match self {
            OperationError::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let reason = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        OperationError::Panicked { reason }
    }
}
