//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot mutexes, plus relaxed
//! counters for pool statistics.

pub(crate) mod atomics;
pub(crate) mod mutex;
