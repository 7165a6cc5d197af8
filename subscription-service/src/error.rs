//! Error taxonomy for the subscription engine.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Invalid subscription setup. Raised during validation and blocks
    /// persistence.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation not allowed in the subscription's current state.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator (persistence, invoicing, catalog) failed. Aborts
    /// the current tick without touching subscription state.
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] anyhow::Error),
}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Configuration(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            BillingError::PolicyViolation(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            BillingError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            BillingError::Collaborator(e) => AppError::InternalError(e),
        }
    }
}
