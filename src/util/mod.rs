//! Small shared utilities.

pub mod bitset;
