//! CLI integration tests.

mod common;
mod signing_tests;
