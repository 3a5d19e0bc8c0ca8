//! Integration tests for debforge-lib.

mod common;
mod orchestrator_tests;
mod signing_tests;
