use std::io;
use std::process::ExitCode;

use certforge::hierarchy;
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use tracing_subscriber::EnvFilter;

/// Certificate authority toolkit
#[derive(Parser)]
#[command(name = "certforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Builds a demo CA hierarchy and prints its PEM artifacts", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild ROOT, SERVER, CLIENT and YeeCloud and write keys, CSRs and
    /// certificates to stdout (the default)
    Rebuild,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    // RUST_LOG wins over the flags.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let result = match cli.command.unwrap_or(Commands::Rebuild) {
        Commands::Rebuild => hierarchy::rebuild(&mut io::stdout().lock(), &mut OsRng),
    };

    match result {
        Ok(authorities) => {
            tracing::info!(count = authorities.len(), "hierarchy rebuilt");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("rebuild failed: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
