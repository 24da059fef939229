//! # tailleur
//!
//! A pluggable benchmark harness. It discovers benchmark types from a list
//! of search locations, runs a chosen subset under controlled iteration with
//! a fixed lifecycle, and emits one JSON report with every raw sample plus
//! host metadata. It measures and records; it never summarizes.
//!
//! ## Architecture Overview
//!
//! - `plugin`: the benchmark contract and the manifest-defined command benchmarks
//! - `discovery`: module sources and the catalog of qualified benchmark names
//! - `selector`: resolution of requested names against the catalog
//! - `benchmark`: the execution engine driving the lifecycle per parameter set
//! - `suite`: orchestration of discovery, selection and execution
//! - `results`: the report schema, host metadata and report output
//! - `config`, `cli`, `logging`: configuration documents, arguments and logging
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tailleur::{
//!     config::{Config, SuiteDocument, SuiteEntry},
//!     discovery::{Discovery, StaticModules},
//!     plugin::{Benchmark, BenchmarkDefinition, IterationResult, MetricMap, ParameterSet, RunFailure},
//!     ResultsManager, SuiteRunner,
//! };
//!
//! #[derive(Default)]
//! struct Startup;
//!
//! impl Benchmark for Startup {
//!     fn run(&mut self, _: &ParameterSet) -> Result<IterationResult, RunFailure> {
//!         let started = std::time::Instant::now();
//!         std::process::Command::new("true").status()?;
//!         Ok(IterationResult::from([("startup".to_string(), started.elapsed().as_secs_f64())]))
//!     }
//! }
//!
//! impl BenchmarkDefinition for Startup {
//!     const NAME: &'static str = "Startup";
//!     const VERSION: u32 = 1;
//!
//!     fn metrics() -> MetricMap {
//!         MetricMap::new()
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let modules = StaticModules::new().module("builtin", "process", |r| {
//!         r.register::<Startup>();
//!         Ok(())
//!     });
//!     let runner = SuiteRunner::new(Discovery::default().with_source(modules));
//!
//!     let mut config = Config::new();
//!     config.set("runs", 10);
//!     config.set("search_paths", serde_json::json!(["builtin"]));
//!
//!     let suite = SuiteDocument {
//!         benchmarks: Some(vec![SuiteEntry::named("Startup")]),
//!         ..Default::default()
//!     };
//!     let report = runner.run(&config, &suite)?;
//!     ResultsManager::new(None).write(&report)
//! }
//! ```

/// Execution engine
///
/// `BenchmarkRunner` drives one benchmark class through setup, the
/// per-iteration hooks and teardown for each parameter set, containing
/// per-iteration failures and panics.
pub mod benchmark;

pub mod cli;
pub mod config;

/// Catalog construction from module sources and search locations.
pub mod discovery;

pub mod logging;

/// The benchmark contract and its built-in implementations.
pub mod plugin;

/// Report schema, host metadata collection and report output.
pub mod results;

pub mod selector;

/// Suite orchestration: discovery, selection and execution for one report.
pub mod suite;

pub mod utils;

pub use benchmark::{BenchmarkRunner, RunError, RunOutcome};
pub use cli::Args;
pub use config::{Config, ConfigError, SuiteDocument, SuiteEntry};
pub use discovery::{BenchmarkDescriptor, Catalog, Discovery, ModuleLoadError};
pub use plugin::{Benchmark, BenchmarkClass, BenchmarkDefinition, RunFailure};
pub use results::{AggregatedResult, HostMetadata, ResultsManager, SuiteReport};
pub use selector::SelectError;
pub use suite::{run_benchmarks, SuiteRunner};

/// The current version of the harness
///
/// Stamped into every report's metadata as `harness_version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Search location used when neither the command line nor the config
    /// document names one.
    pub const SEARCH_PATH: &str = "benchmarks";

    /// Metric name for the wall time of command benchmarks.
    pub const DEFAULT_METRIC: &str = "wall_time";

    /// Lifecycle failures skip the failing benchmark instead of ending the
    /// suite.
    pub const CONTINUE_ON_ERROR: bool = true;
}
