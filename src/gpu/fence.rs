//! Completion gate: the device's progress as a monotonic counter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Answers "has the device finished the work tagged with value N".
///
/// Values are monotonic. Implementations must be safe for concurrent reads;
/// nothing in this crate ever waits on a gate, it only queries.
pub trait CompletionGate: Send + Sync {
    /// Highest value the device has completed.
    fn completed_value(&self) -> u64;

    /// Whether the device has completed `value`.
    fn is_value_reached(&self, value: u64) -> bool {
        value <= self.completed_value()
    }
}

/// In-process fence: submissions draw values from `next_value`, the device
/// side reports progress with `signal`.
#[derive(Debug)]
pub struct FenceCounter {
    /// Last value handed to a submission
    next: AtomicU64,
    /// Highest value reported complete
    completed: AtomicU64,
}

impl FenceCounter {
    /// Create a fence with nothing submitted and nothing completed.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    /// Reserve the completion value for the next submission.
    pub fn next_value(&self) -> u64 {
        self.next.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Last value handed out by `next_value`.
    pub fn last_submitted(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }

    /// Report that the device finished `value`. Never moves backwards.
    pub fn signal(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
    }
}

impl Default for FenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionGate for FenceCounter {
    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }
}
