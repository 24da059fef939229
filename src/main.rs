//! # tailleur - Main Entry Point
//!
//! 1. **Parse arguments** and install logging on stderr
//! 2. **Load configuration**: the global config document, folded with the
//!    command-line overrides, and the optional suite document
//! 3. **List** the catalog and exit when `--list` is given
//! 4. **Run the suite** and write the report exactly once, to `--output` or
//!    stdout
//!
//! A missing or invalid `runs` is fatal before any benchmark executes.
//! Otherwise failing benchmarks are skipped and the report is best effort,
//! unless `--fail-fast` (or `continue_on_error: false`) asks to stop.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use tailleur::{
    cli::Args,
    config::{Config, SuiteDocument},
    logging, ResultsManager, SuiteRunner,
};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init_logging(&args)?;

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    info!("Starting tailleur {}", tailleur::VERSION);

    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::new(),
    };
    args.apply_to(&mut config)?;

    let suite = match args.benchmarks {
        Some(ref path) => SuiteDocument::load(path)?,
        None => SuiteDocument::default(),
    };

    let runner = SuiteRunner::default();

    if args.list {
        let catalog = runner.catalog(&config, &suite)?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        for name in catalog.names() {
            writeln!(handle, "{}", name)?;
        }
        return Ok(());
    }

    let runs = config.runs().context("Cannot run benchmarks")?;
    info!("Configuration: {} run(s) per parameter set", runs);

    let report = runner.run(&config, &suite)?;
    ResultsManager::new(args.output.as_deref()).write(&report)?;

    info!("tailleur completed successfully");
    Ok(())
}
