//! Cooperative yielding: bounds how long one scan turn can hold the thread.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Work-budget pacer. Callers sprinkle [`Pacer::maybe`] through loops and
/// force a yield at structural boundaries (sheet end, batch end); control is
/// handed back to the executor whenever the slice is exhausted.
pub(crate) struct Pacer {
    slice: Duration,
    last_yield: Instant,
    yields: u64,
}

impl Pacer {
    pub fn new(slice: Duration) -> Self {
        Self {
            slice,
            last_yield: Instant::now(),
            yields: 0,
        }
    }

    /// Yield only if more than the slice elapsed since the last yield.
    pub async fn maybe(&mut self) {
        if self.last_yield.elapsed() > self.slice {
            self.force().await;
        }
    }

    /// Unconditional yield.
    pub async fn force(&mut self) {
        tokio::task::yield_now().await;
        self.yields += 1;
        self.last_yield = Instant::now();
        trace!(yields = self.yields, "yielded to executor");
    }

    pub fn yield_count(&self) -> u64 {
        self.yields
    }
}
