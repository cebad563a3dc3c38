//! Errors returned by cache reads.

use std::sync::Arc;

use daybreak_core::BoundaryError;
use thiserror::Error;

/// Failure of a cache read.
///
/// Producer failures are shared: every caller that waited on the same
/// computation receives a clone of the same `Arc`, which is also the
/// error's `source()`.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error("Producer failed: {0}")]
    Producer(#[source] Arc<E>),

    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

impl<E> CacheError<E> {
    /// The producer's error, if that is what failed.
    pub fn producer_error(&self) -> Option<&Arc<E>> {
        match self {
            Self::Producer(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_producer_failure(&self) -> bool {
        matches!(self, Self::Producer(_))
    }
}

impl<E> Clone for CacheError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Producer(e) => Self::Producer(Arc::clone(e)),
            Self::Boundary(e) => Self::Boundary(e.clone()),
            Self::InvalidKey { key, reason } => Self::InvalidKey {
                key: key.clone(),
                reason: reason.clone(),
            },
        }
    }
}
