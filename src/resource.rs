use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tracing::warn;

use crate::error::{ReadError, WaitError};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
enum State<T, E> {
    Pending,
    Settled(Result<T, E>),
    Aborted,
}

impl<T, E> State<T, E> {
    fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }
}

/// Settlement of a [`Resource`], as reported by [`Resource::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Pending,
    Resolved,
    Rejected,
    Aborted,
}

/// Handle on an asynchronous computation that can be read without blocking.
///
/// The computation starts as soon as the resource is created and runs to
/// completion whether or not anyone reads it. Clones share the computation,
/// so every handle observes the same outcome.
pub struct Resource<T, E> {
    id: u64,
    state: watch::Receiver<State<T, E>>,
}

impl<T, E> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            state: self.state.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resource<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T, E> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Start `future` on the current tokio runtime and wrap it.
    ///
    /// **Panic**:
    /// If called outside of a tokio runtime.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let id = NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(State::Pending);
        tokio::spawn(async move {
            let state = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => State::Settled(outcome),
                Err(_) => {
                    warn!(resource = id, "resource computation panicked");
                    State::Aborted
                }
            };
            tx.send_replace(state);
        });
        Self { id, state: rx }
    }

    /// A resource that has already resolved to `value`.
    pub fn ready(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// A resource that has already failed with `error`.
    pub fn failed(error: E) -> Self {
        Self::settled(Err(error))
    }

    fn settled(outcome: Result<T, E>) -> Self {
        let (_, rx) = watch::channel(State::Settled(outcome));
        Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            state: rx,
        }
    }

    /// Read the resource without waiting.
    ///
    /// ```rust
    /// # use suspense_resource_cache::{ReadError, Resource};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let resource = Resource::<u32, String>::new(async { Ok(25) });
    /// let value = match resource.read() {
    ///     Ok(value) => value,
    ///     // Not settled yet: the pending handle resolves once it is.
    ///     Err(ReadError::Pending(pending)) => pending.await.unwrap(),
    ///     Err(err) => panic!("{err}"),
    /// };
    /// assert_eq!(value, 25);
    /// # }
    /// ```
    pub fn read(&self) -> Result<T, ReadError<T, E>> {
        match &*self.state.borrow() {
            State::Settled(Ok(value)) => Ok(value.clone()),
            State::Settled(Err(error)) => Err(ReadError::Failed(error.clone())),
            State::Aborted => Err(ReadError::Aborted),
            // The driver task was dropped without reporting, e.g. on runtime shutdown.
            State::Pending if self.state.has_changed().is_err() => Err(ReadError::Aborted),
            State::Pending => Err(ReadError::Pending(Pending {
                resource: self.clone(),
            })),
        }
    }

    /// Wait for the computation to settle.
    pub async fn wait(&self) -> Result<T, WaitError<E>> {
        let mut state = self.state.clone();
        let settled = match state.wait_for(|s| !s.is_pending()).await {
            Ok(settled) => settled,
            // The driver task was dropped without reporting, e.g. on runtime shutdown.
            Err(_) => return Err(WaitError::Aborted),
        };
        match &*settled {
            State::Settled(Ok(value)) => Ok(value.clone()),
            State::Settled(Err(error)) => Err(WaitError::Failed(error.clone())),
            State::Aborted | State::Pending => Err(WaitError::Aborted),
        }
    }

    /// As [`Resource::wait`], giving up once `timeout` has elapsed.
    /// The computation itself keeps running.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<T, WaitError<E>> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(WaitError::TimedOut(timeout)),
        }
    }
}

impl<T, E> Resource<T, E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> ResourceStatus {
        match &*self.state.borrow() {
            State::Pending if self.state.has_changed().is_err() => ResourceStatus::Aborted,
            State::Pending => ResourceStatus::Pending,
            State::Settled(Ok(_)) => ResourceStatus::Resolved,
            State::Settled(Err(_)) => ResourceStatus::Rejected,
            State::Aborted => ResourceStatus::Aborted,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status() != ResourceStatus::Pending
    }

    /// Whether both handles share the same computation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.id == b.id
    }
}

/// The in-flight computation behind a pending read.
///
/// Awaiting it yields the settled outcome.
pub struct Pending<T, E> {
    resource: Resource<T, E>,
}

impl<T, E> Pending<T, E> {
    /// The resource that is still pending.
    pub fn resource(&self) -> &Resource<T, E> {
        &self.resource
    }
}

impl<T, E> fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("resource", &self.resource.id)
            .finish()
    }
}

impl<T, E> IntoFuture for Pending<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Output = Result<T, WaitError<E>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.resource.wait().await }.boxed()
    }
}
