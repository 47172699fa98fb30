//! An asynchronous resource cache for render-as-you-fetch data loading.
//!
//! A [`Resource`] wraps a computation that starts immediately and can be read
//! without blocking: the read yields the value, the captured error, or a
//! [`Pending`] handle to await. A [`ResourceCache`] keeps one resource per
//! (lower-cased) name so concurrent lookups share a single fetch, and evicts
//! entries once they expire.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod resource;

pub use cache::{normalize_key, CacheStats, ResourceCache};
pub use config::{CacheConfig, ConfigLoader, Expiration, ExpirationMode};
pub use error::{ConfigError, ReadError, WaitError};
pub use fetch::{fetch_fn, Fetch, FetchFn};
pub use resource::{Pending, Resource, ResourceStatus};
