// src/scheduler.rs - Monotonic request tickets for stale-response discard

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues monotonically increasing request tickets and remembers which one is
/// current.
///
/// Every operation that produces an asynchronous result takes a ticket with
/// [`issue`](Self::issue) before suspending and checks
/// [`is_current`](Self::is_current) when its result arrives. A stale ticket
/// means a newer operation was issued in the meantime and the result must be
/// dropped without touching state, regardless of completion order.
#[derive(Debug, Default)]
pub(crate) struct RequestScheduler {
    current: AtomicU64,
}

impl RequestScheduler {
    /// Take a new ticket, superseding all previously issued ones.
    pub(crate) fn issue(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, ticket: u64) -> bool {
        self.current.load(Ordering::SeqCst) == ticket
    }
}
