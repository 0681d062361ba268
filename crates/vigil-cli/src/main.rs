//! Command-line entry point for the parallel on-host scan pipeline
//! (§6, §10.3). Parses arguments, initializes logging, and hands off to
//! `vigil_core::supervisor::run`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use vigil_core::config::resolve_signature_dir;
use vigil_core::engine::StubEngine;
use vigil_core::supervisor::{self, RunOptions};

/// Parallel on-host malware scanner.
#[derive(Parser, Debug)]
#[command(name = "vigilscan", version, about, long_about = None)]
struct Cli {
    /// File or directory to scan.
    path: PathBuf,

    /// Number of consumer (file-scanning) worker processes.
    #[arg(default_value_t = 1)]
    workers: usize,

    /// Suppress per-file "OK" lines; infections, errors, and the
    /// summary are still printed.
    #[arg(short, long)]
    quiet: bool,

    /// Signature-database directory passed to the scan engine.
    ///
    /// Defaults to the `VIGILSCAN_SIGNATURES` environment variable, or
    /// a conventional system path if that is unset.
    #[arg(long, env = "VIGILSCAN_SIGNATURES")]
    signatures: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let opts = RunOptions {
        path: cli.path,
        workers: cli.workers,
        signature_dir: resolve_signature_dir(cli.signatures),
        quiet: cli.quiet,
    };

    let outcome = supervisor::run::<StubEngine>(opts).context("vigilscan failed to run")?;

    if outcome.cancelled {
        tracing::info!("scan cancelled by user; partial results printed above");
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("VIGILSCAN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
