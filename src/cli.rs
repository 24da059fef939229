use crate::config::{Config, CONTINUE_ON_ERROR_KEY, RUNS_KEY};
use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// tailleur - discover benchmarks, run them and report their raw samples
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Global configuration document (JSON or YAML)
    #[clap(short = 'c', long, help_heading = "Core Options")]
    pub config: Option<PathBuf>,

    /// Suite document selecting benchmarks and their overrides (JSON or YAML)
    #[clap(long, help_heading = "Core Options")]
    pub benchmarks: Option<PathBuf>,

    /// Directory to search for benchmark modules (repeatable)
    #[clap(long = "search-path", help_heading = "Core Options")]
    pub search_paths: Vec<PathBuf>,

    /// Number of iterations per parameter set (overrides the config's `runs`)
    #[clap(short = 'r', long)]
    pub runs: Option<usize>,

    /// Output file for the report (JSON format); stdout when omitted
    #[clap(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Abort the suite on the first setup, hook or teardown failure
    #[clap(long, default_value_t = false)]
    pub fail_fast: bool,

    /// List discovered benchmarks and exit
    #[clap(long, default_value_t = false)]
    pub list: bool,

    /// Only log errors
    #[clap(short = 'q', long, default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Also write plain-text logs to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Log level used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::ERROR;
        }
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Search locations given on the command line, or the default one.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            vec![PathBuf::from(crate::defaults::SEARCH_PATH)]
        } else {
            self.search_paths.clone()
        }
    }

    /// Fold command-line overrides into the loaded configuration.
    ///
    /// `--search-path` replaces the search paths of the config document.
    /// The default location is only used when neither names any.
    pub fn apply_to(&self, config: &mut Config) -> Result<(), crate::config::ConfigError> {
        let configured = config.search_paths()?;
        if !self.search_paths.is_empty() || configured.is_empty() {
            config.set_search_paths(&self.search_paths());
        }

        if let Some(runs) = self.runs {
            config.set(RUNS_KEY, runs);
        }
        if self.fail_fast {
            config.set(CONTINUE_ON_ERROR_KEY, false);
        }
        Ok(())
    }
}
