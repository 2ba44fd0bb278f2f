//! The caller-supplied refresh function.

use async_trait::async_trait;
use std::future::Future;

/// Boxed error returned by a [`Refresher`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Produces a fresh value for a key.
///
/// The refresher may take arbitrarily long; the cache bounds how long readers
/// wait for it but never cancels it.
///
/// Any `Fn(String) -> impl Future<Output = Result<V, BoxError>>` closure is a
/// refresher:
///
/// ```ignore
/// let refresher = |key: String| async move {
///     db.load(&key).await.map_err(BoxError::from)
/// };
/// ```
#[async_trait]
pub trait Refresher<V>: Send + Sync {
    /// Load the current value for `key`.
    async fn refresh(&self, key: String) -> Result<V, BoxError>;
}

#[async_trait]
impl<V, F, Fut> Refresher<V> for F
where
    V: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<V, BoxError>> + Send + 'static,
{
    async fn refresh(&self, key: String) -> Result<V, BoxError> {
        (self)(key).await
    }
}
