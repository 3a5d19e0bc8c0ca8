mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, KeygenArgs, VerifyArgs, cmd_build, cmd_keygen, cmd_verify};

/// debforge - build Debian-style packages and signed changes records
#[derive(Parser)]
#[command(name = "debforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a package, and a changes file when --changes-out is given
  Build(BuildArgs),

  /// Generate a signing key and add it to a keyring
  Keygen(KeygenArgs),

  /// Verify a signed changes file
  Verify(VerifyArgs),
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::from_default_env()
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build(args) => cmd_build(args),
    Commands::Keygen(args) => cmd_keygen(args),
    Commands::Verify(args) => cmd_verify(args),
  }
}
