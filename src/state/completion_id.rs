use std::sync::atomic::{AtomicU64, Ordering};

use crate::util::format_completion_id;

const COMPLETION_ID_PREFIX: &str = "chatcmpl-";

/// Lock-free completion id source.
///
/// Ids are a random per-process seed XOR a monotonically increasing counter,
/// so they are unique within the process without a syscall per request.
pub(crate) struct CompletionIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl CompletionIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        let seed_hi = u128::from(fastrand::u64(..));
        let seed_lo = u128::from(fastrand::u64(..));
        Self {
            seed: (seed_hi << 64) | seed_lo,
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format_completion_id(
            COMPLETION_ID_PREFIX,
            uuid::Uuid::from_u128(self.seed ^ u128::from(seq)),
        )
    }
}
