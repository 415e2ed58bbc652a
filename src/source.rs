// src/source.rs - Paged asynchronous item source

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A paged asynchronous data source for online mode.
///
/// The controller calls `fetch` with the active query, a 0-based page number,
/// and the configured page size. Returning fewer items than `page_size`
/// (including none) signals that no further pages exist.
///
/// Errors are surfaced to the controller verbatim: whatever error value the
/// source produces is stored unmodified as the controller's current error and
/// can be recovered by downcasting.
#[async_trait]
pub trait ItemSource<T>: Send + Sync {
    async fn fetch(&self, query: &str, page: usize, page_size: usize) -> anyhow::Result<Vec<T>>;
}

struct FnSource<F> {
    fetch: F,
}

#[async_trait]
impl<T, F, Fut> ItemSource<T> for FnSource<F>
where
    T: Send + 'static,
    F: Fn(String, usize, usize) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send,
{
    async fn fetch(&self, query: &str, page: usize, page_size: usize) -> anyhow::Result<Vec<T>> {
        (self.fetch)(query.to_string(), page, page_size).await
    }
}

/// Wrap a plain async closure `(query, page, page_size) -> items` as an
/// [`ItemSource`], ready to hand to the controller.
pub fn source_fn<T, F, Fut>(fetch: F) -> Arc<dyn ItemSource<T>>
where
    T: Send + 'static,
    F: Fn(String, usize, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send + 'static,
{
    Arc::new(FnSource { fetch })
}
