//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, staged writes
//! and test helpers.

pub mod hash;
pub mod staging;

#[cfg(test)]
pub mod testutil;
