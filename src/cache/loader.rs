//! Loader handles and the bounded retry wrapper.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::warn;

use crate::application::error::ApiError;

pub type LoadResult<T> = Result<T, ApiError>;

/// Re-invocable read. Stored by subscriptions so invalidation can refetch.
pub type Loader<T> = Arc<dyn Fn() -> BoxFuture<'static, LoadResult<T>> + Send + Sync>;

/// Wrap an async closure as a [`Loader`].
pub fn loader<T, F, Fut>(f: F) -> Loader<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Retry transient failures (network, 5xx) up to `attempts` extra times.
///
/// Not-found and validation errors are returned immediately.
pub fn with_retry<T>(attempts: u32, inner: Loader<T>) -> Loader<T>
where
    T: Send + 'static,
{
    if attempts == 0 {
        return inner;
    }

    Arc::new(move || {
        let inner = Arc::clone(&inner);
        async move {
            let mut remaining = attempts;
            loop {
                match inner().await {
                    Err(error) if remaining > 0 && error.is_transient() => {
                        remaining -= 1;
                        warn!(
                            error = %error,
                            retries_left = remaining,
                            "Retrying failed query load"
                        );
                    }
                    outcome => return outcome,
                }
            }
        }
        .boxed()
    })
}
