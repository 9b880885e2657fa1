mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use newt_build_lib::bootstrap::BootstrapError;
use newt_build_lib::config::Action;
use newt_build_lib::platform::arch::Arch;

use crate::cmd::GlobalOpts;

/// newt-build - bootstrap LLVM from source and build llvm-sys projects against it
#[derive(Parser)]
#[command(name = "newt-build")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Architecture to build LLVM and the project for
  #[arg(long, global = true, default_value = "x64")]
  host: Arch,

  /// Build the project in release mode (LLVM is always built optimized)
  #[arg(long, global = true)]
  release: bool,

  /// Bootstrap root holding LLVM sources, build trees and installs
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Settings file (default: newt-build.toml in the working directory, if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the project (cargo build)
  Build {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Build and run the project (cargo run)
  Run {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Format the project (cargo fmt)
  Fmt {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Lint the project (cargo clippy)
  Clippy {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Remove the project's build artifacts (cargo clean)
  Clean {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Build the project's documentation (cargo doc)
  Doc {
    /// Extra arguments passed to cargo after `--`
    #[arg(last = true)]
    args: Vec<String>,
  },
  /// Bootstrap LLVM only and print how to point llvm-sys at it
  Setup,
}

impl Commands {
  fn into_cargo(self) -> Option<(Action, Vec<String>)> {
    match self {
      Commands::Build { args } => Some((Action::Build, args)),
      Commands::Run { args } => Some((Action::Run, args)),
      Commands::Fmt { args } => Some((Action::Format, args)),
      Commands::Clippy { args } => Some((Action::Lint, args)),
      Commands::Clean { args } => Some((Action::Clean, args)),
      Commands::Doc { args } => Some((Action::Doc, args)),
      Commands::Setup => None,
    }
  }
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let opts = GlobalOpts {
    host: cli.host,
    release: cli.release,
    root: cli.root,
    config: cli.config,
  };

  let result = match cli.command.into_cargo() {
    Some((action, args)) => cmd::cmd_cargo(&opts, action, args),
    None => cmd::cmd_setup(&opts),
  };

  if let Err(err) = result {
    output::print_error(&format!("{:#}", err));
    std::process::exit(exit_code(&err));
  }
}

/// The downstream tool's own code when it is what failed, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
  err
    .downcast_ref::<BootstrapError>()
    .and_then(BootstrapError::downstream_exit_code)
    .filter(|code| *code != 0)
    .unwrap_or(1)
}
