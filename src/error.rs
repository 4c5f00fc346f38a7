//! Error kinds surfaced by the payment lifecycle core.
//!
//! Every kind is terminal for the call that raised it. `ConcurrentModification`
//! is the only kind a caller may retry, and only after re-reading state.

use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("invalid transition from {from} to {requested}")]
    InvalidTransition { from: String, requested: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),
    #[error("missing evidence: {0}")]
    MissingEvidence(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("concurrent modification of {0}")]
    ConcurrentModification(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] sled::Error),
    #[error("codec failure: {0}")]
    Codec(String),
}

impl LifecycleError {
    pub fn invalid_transition(from: impl ToString, requested: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            requested: requested.to_string(),
        }
    }
}

// A transaction either aborted with one of our kinds or failed in the store.
impl From<TransactionError<LifecycleError>> for LifecycleError {
    fn from(err: TransactionError<LifecycleError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => LifecycleError::Store(e),
        }
    }
}
