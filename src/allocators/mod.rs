//! Allocation backends.
//!
//! This module contains the allocator implementations: the persistent bump
//! allocator over host-only heaps, the transient allocator over recycled
//! shader-visible segments, and the binding caches that feed it.

pub mod binding_cache;
pub mod handle;
pub mod persistent;
pub mod pool;
pub mod sampler_cache;
pub mod transient;
pub mod user_heap;
