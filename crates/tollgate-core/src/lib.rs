//! Token lifecycle core for tollgated
//!
//! This crate contains:
//! - Expiration evaluation (not started / never / timed)
//! - Daily quota window projection
//! - The status guard that keeps expired or exhausted tokens disabled
//! - The owner-scoped token service the daemon calls into
//!
//! Every computation takes `now` as a parameter.

mod guard;
mod lifecycle;
mod service;
mod view;
mod window;

#[cfg(test)]
mod test_support;

pub use guard::*;
pub use lifecycle::*;
pub use service::*;
pub use view::*;
pub use window::*;

use thiserror::Error;
use tollgate_api::StatusRejection;
use tollgate_store::StoreError;

/// A request that fails validation before any state is read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("token name is too long: {len} bytes, at most {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("no token ids given")]
    EmptyBatch,

    #[error("status-only update needs a status")]
    MissingStatus,

    #[error("extension must be positive, got {0} seconds")]
    NonPositiveExtension(i64),
}

/// Core errors
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Rejected(StatusRejection),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected(reason) => CoreError::Rejected(reason),
            StoreError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Store(other),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
