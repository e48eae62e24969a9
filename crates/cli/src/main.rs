mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::print_error;

/// pullstack - pull-based deployment agent
#[derive(Parser)]
#[command(name = "pullstack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging (overridden by RUST_LOG)
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Apply a configuration once
  Apply {
    /// Configuration location (path or URL)
    config: String,
  },

  /// Watch a configuration and apply it whenever it changes
  Watch {
    /// Configuration location (path or URL)
    config: String,
  },

  /// Supervisor daemon started by the built-in service manager
  #[command(hide = true)]
  ServiceRunner {
    /// Client address to connect back to
    #[arg(long)]
    address: String,

    /// File the supervised services are persisted in
    #[arg(long)]
    state_file: PathBuf,
  },

  /// Copy a file between locations
  Cp {
    /// Source location
    src: String,

    /// Destination location; a trailing `/` keeps the source file name
    dst: String,
  },

  /// List the names at a location
  Ls {
    /// Directory location
    location: String,
  },

  /// Remove a file at a location
  Rm {
    /// File location
    location: String,
  },

  /// Install this agent as a service that watches a configuration
  Install {
    /// Configuration location (path or URL)
    config: String,
  },

  /// Show what this node has applied
  Status {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

fn init_tracing(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Apply { config } => cmd::cmd_apply(&config),
    Commands::Watch { config } => cmd::cmd_watch(&config),
    Commands::ServiceRunner { address, state_file } => cmd::cmd_service_runner(&address, &state_file),
    Commands::Cp { src, dst } => cmd::cmd_cp(&src, &dst),
    Commands::Ls { location } => cmd::cmd_ls(&location),
    Commands::Rm { location } => cmd::cmd_rm(&location),
    Commands::Install { config } => cmd::cmd_install(&config),
    Commands::Status { json } => cmd::cmd_status(cli.verbose, json),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
