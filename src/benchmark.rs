//! # Benchmark Engine Module
//!
//! Drives the lifecycle of one benchmark class across its parameter sets and
//! collects the samples each iteration produces.
//!
//! ## Execution Lifecycle
//!
//! For each parameter set, in declaration order:
//!
//! 1. **Instantiation**: a fresh instance, never shared across sets
//! 2. **Setup**: `setup()` once; a failure ends the benchmark, no teardown
//! 3. **Iterations**: `runs` times `pre_run()`, `run()`, `post_run()`
//! 4. **Teardown**: `teardown()` once
//! 5. **Aggregation**: successful iterations fold into one [`AggregatedResult`]
//!
//! ## Failure Handling
//!
//! A failing or panicking `run()` drops that iteration and the loop moves on;
//! `post_run()` still executes. Failures in the other hooks are lifecycle
//! errors: they end the benchmark and propagate to the caller as
//! [`RunError`]. When `pre_run()` or `post_run()` fails, `teardown()` is still
//! attempted so external resources are released.

use crate::{
    config::{Config, ConfigError},
    discovery::BenchmarkDescriptor,
    plugin::{Benchmark, ClassRef, Hook, ParameterSet},
    results::{AggregatedResult, SampleCollector},
    utils::format_duration,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures that end a benchmark before all parameter sets complete.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration for benchmark '{benchmark}': {source}")]
    Config {
        benchmark: String,
        #[source]
        source: ConfigError,
    },

    #[error(
        "benchmark '{benchmark}' does not accept parameter(s): {}",
        .unknown.join(", ")
    )]
    InvalidParameters {
        benchmark: String,
        unknown: Vec<String>,
    },

    #[error("setup failed for benchmark '{benchmark}': {reason}")]
    Setup { benchmark: String, reason: String },

    #[error("{hook} failed for benchmark '{benchmark}' at iteration {iteration}: {reason}")]
    Hook {
        benchmark: String,
        hook: Hook,
        iteration: usize,
        reason: String,
    },

    #[error("teardown failed for benchmark '{benchmark}': {reason}")]
    Teardown { benchmark: String, reason: String },
}

/// Results of the parameter sets that completed, and the error that stopped
/// the remaining ones, if any.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub results: Vec<AggregatedResult>,
    pub error: Option<RunError>,
}

impl RunOutcome {
    fn failed(error: RunError) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Vec<AggregatedResult>, RunError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

impl RunError {
    /// Whether the failure came from a lifecycle hook rather than from the
    /// benchmark's configuration.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            RunError::Setup { .. } | RunError::Hook { .. } | RunError::Teardown { .. }
        )
    }
}

/// Runs one benchmark class with one effective configuration.
///
/// ```rust,no_run
/// # use tailleur::benchmark::BenchmarkRunner;
/// # use tailleur::config::Config;
/// # use tailleur::plugin::ClassRef;
/// # fn demo(class: ClassRef) -> anyhow::Result<()> {
/// let mut config = Config::new();
/// config.set("runs", 5);
///
/// let runner = BenchmarkRunner::new("module.Latency", class, config);
/// let results = runner.run(&[])?;
/// assert_eq!(results.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    name: String,
    class: ClassRef,
    config: Config,
}

impl BenchmarkRunner {
    pub fn new(name: impl Into<String>, class: ClassRef, config: Config) -> Self {
        Self {
            name: name.into(),
            class,
            config,
        }
    }

    /// Runner for a catalog entry, its config override merged over `global`.
    pub fn for_descriptor(descriptor: &BenchmarkDescriptor, global: &Config) -> Self {
        Self::new(
            descriptor.name.clone(),
            Arc::clone(&descriptor.class),
            global.merged(&descriptor.config),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every parameter set in order; an empty slice runs one empty set.
    ///
    /// Fails with the first error; results of completed sets are discarded.
    /// Use [`BenchmarkRunner::run_completed`] to keep them.
    pub fn run(&self, parameter_sets: &[ParameterSet]) -> Result<Vec<AggregatedResult>, RunError> {
        self.run_completed(parameter_sets).into_result()
    }

    /// Run every parameter set in order, stopping at the first error but
    /// keeping the results of the sets that finished before it.
    pub fn run_completed(&self, parameter_sets: &[ParameterSet]) -> RunOutcome {
        let runs = match self.config.runs() {
            Ok(runs) => runs,
            Err(source) => {
                return RunOutcome::failed(RunError::Config {
                    benchmark: self.name.clone(),
                    source,
                })
            }
        };

        let substituted;
        let parameter_sets = if parameter_sets.is_empty() {
            substituted = [ParameterSet::new()];
            &substituted[..]
        } else {
            parameter_sets
        };
        if let Err(e) = self.validate_parameters(parameter_sets) {
            return RunOutcome::failed(e);
        }

        info!(
            "Running {} ({} parameter set(s), {} run(s) each)",
            self.name,
            parameter_sets.len(),
            runs
        );

        let mut outcome = RunOutcome::default();
        for parameters in parameter_sets {
            match self.run_parameter_set(parameters, runs) {
                Ok(result) => outcome.results.push(result),
                Err(e) => {
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    }

    fn validate_parameters(&self, parameter_sets: &[ParameterSet]) -> Result<(), RunError> {
        let Some(accepted) = self.class.accepted_parameters() else {
            return Ok(());
        };

        let mut unknown: Vec<String> = parameter_sets
            .iter()
            .flat_map(|set| set.keys())
            .filter(|key| !accepted.contains(key))
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(RunError::InvalidParameters {
                benchmark: self.name.clone(),
                unknown,
            })
        }
    }

    fn run_parameter_set(
        &self,
        parameters: &ParameterSet,
        runs: usize,
    ) -> Result<AggregatedResult, RunError> {
        let metrics = self.class.metrics();
        let mut collector = SampleCollector::new(&self.name, &metrics);

        let mut instance = self.class.instantiate().map_err(|e| RunError::Setup {
            benchmark: self.name.clone(),
            reason: format!("could not instantiate: {:#}", e),
        })?;
        instance.setup().map_err(|e| RunError::Setup {
            benchmark: self.name.clone(),
            reason: format!("{:#}", e),
        })?;

        for iteration in 1..=runs {
            info!("Running {} iter {}", self.name, iteration);

            if let Err(e) = instance.pre_run() {
                return Err(self.abort(instance.as_mut(), Hook::PreRun, iteration, e));
            }

            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.run(parameters)));
            let elapsed = started.elapsed();
            let post_run = instance.post_run();

            match outcome {
                Ok(Ok(samples)) => {
                    debug!(
                        "{} iter {} produced {} sample(s) in {}",
                        self.name,
                        iteration,
                        samples.len(),
                        format_duration(elapsed)
                    );
                    collector.record(iteration, samples);
                }
                Ok(Err(failure)) => {
                    if failure.has_partial_samples() {
                        warn!(
                            "Failure while running benchmark '{}' iter {}: {:#} (discarding {} partial sample(s))",
                            self.name,
                            iteration,
                            failure.error(),
                            failure.partial().len()
                        );
                    } else {
                        warn!(
                            "Failure while running benchmark '{}' iter {}: {:#}",
                            self.name,
                            iteration,
                            failure.error()
                        );
                    }
                }
                Err(payload) => {
                    warn!(
                        "Benchmark '{}' panicked in iter {}: {}",
                        self.name,
                        iteration,
                        panic_message(payload.as_ref())
                    );
                }
            }

            if let Err(e) = post_run {
                return Err(self.abort(instance.as_mut(), Hook::PostRun, iteration, e));
            }
        }

        instance.teardown().map_err(|e| RunError::Teardown {
            benchmark: self.name.clone(),
            reason: format!("{:#}", e),
        })?;

        Ok(AggregatedResult {
            name: self.name.clone(),
            version: self.class.version(),
            metrics: metrics.clone(),
            metadata: self.class.metadata(),
            parameters: parameters.clone(),
            data: collector.into_data(),
            config: self.config.as_map().clone(),
        })
    }

    /// Best-effort teardown after a failed per-iteration hook.
    fn abort(
        &self,
        instance: &mut dyn Benchmark,
        hook: Hook,
        iteration: usize,
        error: anyhow::Error,
    ) -> RunError {
        if let Err(e) = instance.teardown() {
            warn!(
                "teardown after failed {} of '{}' also failed: {:#}",
                hook, self.name, e
            );
        }
        RunError::Hook {
            benchmark: self.name.clone(),
            hook,
            iteration,
            reason: format!("{:#}", error),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
