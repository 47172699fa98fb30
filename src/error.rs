use std::time::Duration;

use thiserror::Error;

use crate::resource::Pending;

/// Outcome of a non-blocking [`Resource::read`](crate::Resource::read) that did not yield a value.
#[derive(Debug, Error)]
pub enum ReadError<T, E> {
    /// The computation is still in flight. Await the handle to be woken once it settles.
    #[error("resource is still pending")]
    Pending(Pending<T, E>),

    /// The computation settled with an error. The same error is handed back on every read.
    #[error("resource failed: {0}")]
    Failed(E),

    /// The computation panicked or was cancelled before it could settle.
    #[error("resource computation aborted before settling")]
    Aborted,
}

impl<T, E> ReadError<T, E> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Error returned when awaiting a resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E> {
    #[error("resource failed: {0}")]
    Failed(E),

    #[error("resource did not settle within {0:?}")]
    TimedOut(Duration),

    #[error("resource computation aborted before settling")]
    Aborted,
}

impl<E> WaitError<E> {
    /// The fetch error, if the resource settled with one.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Invalid cache configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid ttl_ms: 0. Expiring caches need a positive time-to-live")]
    ZeroTtl,

    #[error("Invalid sweep_interval_ms: 0. Must be at least 1")]
    ZeroSweepInterval,

    #[error(
        "Invalid sweep interval: sweep_interval_ms ({sweep_interval_ms}) must not exceed ttl_ms ({ttl_ms})"
    )]
    SweepExceedsTtl { sweep_interval_ms: u64, ttl_ms: u64 },

    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}
