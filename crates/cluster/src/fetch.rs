//! The user fetch seam.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// User-supplied fetch function.
///
/// The dispatcher guarantees at most one concurrent invocation per key per
/// node; invocations for distinct keys run with arbitrary concurrency, so
/// implementations must be `Send + Sync`.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    async fn fetch(&self, params: Value) -> anyhow::Result<Value>;
}

struct FnFetch<F>(F);

#[async_trait]
impl<F, Fut> Fetch for FnFetch<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn fetch(&self, params: Value) -> anyhow::Result<Value> {
        (self.0)(params).await
    }
}

/// Wraps an async closure as a [`Fetch`].
pub fn fetch_fn<F, Fut>(f: F) -> Arc<dyn Fetch>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnFetch(f))
}
