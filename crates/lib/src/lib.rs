//! debforge-lib: Core types and logic for debforge
//!
//! This crate builds Debian-style binary packages and, optionally, a signed
//! changes record describing the build:
//! - `BuildConfig`: immutable settings for one build
//! - `BuildOrchestrator`: validate → build package → build+sign changes
//! - `PackagingEngine` / `ChangesEngine`: the engines the orchestrator drives
//! - `DataProducer`: opaque content sources enumerated into the package
//! - `MessageSink`: where every success and failure message goes

pub mod changes;
pub mod config;
pub mod consts;
pub mod orchestrate;
pub mod package;
pub mod producer;
pub mod signing;
pub mod sink;
pub mod util;
pub mod validate;

pub use config::{BuildConfig, Passphrase};
pub use orchestrate::{BuildError, BuildOrchestrator, BuildReport, BuildState};
pub use sink::{MemorySink, MessageSink, TracingSink};
