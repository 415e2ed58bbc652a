// Common test fixtures: canned item sources with call accounting

use siftview::{ItemSource, source_fn};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Route controller tracing through the test harness. Safe to call from
/// every test; only the first call wins.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Source that slices a fixed dataset into pages and counts every fetch.
#[allow(dead_code)]
pub fn paged_source(pages: Vec<Vec<String>>) -> (Arc<dyn ItemSource<String>>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let source = source_fn(move |_query: String, page: usize, _page_size: usize| {
        let pages = pages.clone();
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(pages.get(page).cloned().unwrap_or_default())
        }
    });
    (source, calls)
}

/// Source that answers call N with the Nth script entry (the last entry
/// repeats). Lets a test fail once and then succeed, page by page.
#[allow(dead_code)]
pub fn scripted_source(
    script: Vec<Result<Vec<String>, String>>,
) -> (Arc<dyn ItemSource<String>>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let source = source_fn(move |_query: String, _page: usize, _page_size: usize| {
        let script = script.clone();
        let counter = counter.clone();
        async move {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            let entry = script
                .get(call)
                .or_else(|| script.last())
                .cloned()
                .expect("script must not be empty");
            entry.map_err(|message| anyhow::anyhow!(message))
        }
    });
    (source, calls)
}

/// Source whose latency depends on the query, for supersession tests.
/// Unknown queries answer immediately with the query echoed back.
#[allow(dead_code)]
pub fn latency_source(
    latencies: Vec<(String, Duration)>,
) -> Arc<dyn ItemSource<String>> {
    source_fn(move |query: String, _page: usize, _page_size: usize| {
        let delay = latencies
            .iter()
            .find(|(q, _)| *q == query)
            .map(|(_, d)| *d)
            .unwrap_or(Duration::ZERO);
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(vec![query])
        }
    })
}
