//! Implementation of the `debforge keygen` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use debforge_lib::Passphrase;
use debforge_lib::signing::Keyring;

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success};

#[derive(Args, Debug)]
pub struct KeygenArgs {
  /// Keyring file to add the key to (created if missing)
  #[arg(long, env = "DEBFORGE_KEYRING", value_name = "FILE")]
  keyring: PathBuf,

  /// Id for the new key
  #[arg(long, env = "DEBFORGE_KEY", value_name = "ID")]
  key: String,

  /// Seal the key with this passphrase
  #[arg(long, env = "DEBFORGE_PASSPHRASE", hide_env_values = true)]
  passphrase: Option<String>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct KeygenOutput {
  keyring: PathBuf,
  id: String,
  public_key: String,
  sealed: bool,
}

pub fn cmd_keygen(args: KeygenArgs) -> Result<()> {
  let mut keyring = if args.keyring.exists() {
    Keyring::load(&args.keyring).with_context(|| format!("Failed to load keyring: {}", args.keyring.display()))?
  } else {
    print_info(&format!("Creating keyring {}", args.keyring.display()));
    Keyring::new()
  };

  let passphrase = args.passphrase.map(Passphrase::new);
  let entry = keyring
    .generate(&args.key, passphrase.as_ref())
    .with_context(|| format!("Failed to generate key '{}'", args.key))?
    .clone();
  keyring
    .save(&args.keyring)
    .with_context(|| format!("Failed to save keyring: {}", args.keyring.display()))?;

  if args.output.is_json() {
    print_json(&KeygenOutput {
      keyring: args.keyring,
      id: entry.id,
      public_key: entry.public_key,
      sealed: passphrase.is_some(),
    })?;
  } else {
    print_success(&format!("Generated key '{}'", entry.id));
    print_stat("Public key", &entry.public_key);
    print_stat("Sealed", if passphrase.is_some() { "yes" } else { "no" });
  }
  Ok(())
}
