use std::future::Future;

use async_trait::async_trait;

/// Source of the values a [`ResourceCache`](crate::ResourceCache) holds.
///
/// The cache hands the fetcher the name exactly as the caller spelled it,
/// even though entries are keyed by the normalized name.
#[async_trait]
pub trait Fetch<T, E>: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<T, E>;
}

/// Adapter turning an async closure into a [`Fetch`] implementation.
pub struct FetchFn<F>(F);

/// Wrap `f` so it can be used as a fetcher.
///
/// ```rust
/// # use suspense_resource_cache::{fetch_fn, Fetch};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetcher = fetch_fn(|name: String| async move { Ok::<_, String>(name.len()) });
/// assert_eq!(fetcher.fetch("bulbasaur").await, Ok(9));
/// # }
/// ```
pub fn fetch_fn<F>(f: F) -> FetchFn<F> {
    FetchFn(f)
}

#[async_trait]
impl<F, Fut, T, E> Fetch<T, E> for FetchFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    async fn fetch(&self, name: &str) -> Result<T, E> {
        (self.0)(name.to_owned()).await
    }
}

#[async_trait]
impl<F, T, E> Fetch<T, E> for std::sync::Arc<F>
where
    F: Fetch<T, E> + ?Sized,
    T: Send + 'static,
    E: Send + 'static,
{
    async fn fetch(&self, name: &str) -> Result<T, E> {
        (**self).fetch(name).await
    }
}
