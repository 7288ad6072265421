//! Round trip accounting for the in-memory store
//!
//! Every call into the store is one round trip, whether it carries a single
//! command or a whole batch. Tests use these counters to check how many
//! trips an operation costs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the store counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of round trips (single commands and batches alike)
    pub round_trips: u64,
    /// Number of commands carried by those round trips
    pub commands: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StoreStatsCounters {
    round_trips: AtomicU64,
    commands: AtomicU64,
}

impl StoreStatsCounters {
    pub(crate) fn record(&self, commands: usize) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.commands.fetch_add(commands as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            round_trips: self.round_trips.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
        self.commands.store(0, Ordering::Relaxed);
    }
}
