//! Message sinks.
//!
//! The orchestrator reports one human-readable line per outcome through a
//! `MessageSink` handed to it by the caller, so separate builds in one process
//! can report to separate places.

use std::sync::Mutex;

use tracing::info;

pub trait MessageSink {
  fn report(&self, message: &str);
}

impl<F: Fn(&str)> MessageSink for F {
  fn report(&self, message: &str) {
    self(message)
  }
}

/// Forwards messages to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
  fn report(&self, message: &str) {
    info!("{}", message);
  }
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
  messages: Mutex<Vec<String>>,
}

impl MemorySink {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of everything reported so far.
  pub fn messages(&self) -> Vec<String> {
    match self.messages.lock() {
      Ok(messages) => messages.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

impl MessageSink for MemorySink {
  fn report(&self, message: &str) {
    match self.messages.lock() {
      Ok(mut messages) => messages.push(message.to_string()),
      Err(poisoned) => poisoned.into_inner().push(message.to_string()),
    }
  }
}
