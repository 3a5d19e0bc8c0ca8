//! Implementation of the `debforge verify` command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use debforge_lib::signing::{Keyring, is_signed, verify_signed_changes};

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success, truncate_hash};

#[derive(Args, Debug)]
pub struct VerifyArgs {
  /// Signed changes file
  file: PathBuf,

  /// Only accept keys from this keyring
  #[arg(long, env = "DEBFORGE_KEYRING", value_name = "FILE")]
  keyring: Option<PathBuf>,

  /// Output format
  #[arg(short = 'o', long, value_enum, default_value = "text")]
  output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
  file: PathBuf,
  key_id: String,
  public_key: String,
  trusted: bool,
}

pub fn cmd_verify(args: VerifyArgs) -> Result<()> {
  let text =
    fs::read_to_string(&args.file).with_context(|| format!("Failed to read changes file: {}", args.file.display()))?;
  if !is_signed(&text) {
    print_error(&format!("{} is not signed", args.file.display()));
    bail!("unsigned changes file");
  }

  let keyring = args
    .keyring
    .as_deref()
    .map(|path| Keyring::load(path).with_context(|| format!("Failed to load keyring: {}", path.display())))
    .transpose()?;

  let verified = match verify_signed_changes(&text, keyring.as_ref()) {
    Ok(verified) => verified,
    Err(e) => {
      print_error(&format!("Verification failed: {}", e));
      return Err(e.into());
    }
  };

  if args.output.is_json() {
    print_json(&VerifyOutput {
      file: args.file,
      key_id: verified.key_id,
      public_key: verified.public_key,
      trusted: keyring.is_some(),
    })?;
  } else {
    print_success(&format!("Good signature from key '{}'", verified.key_id));
    print_stat("Public key", truncate_hash(&verified.public_key));
    print_stat("Keyring", if keyring.is_some() { "checked" } else { "not checked" });
  }
  Ok(())
}
