//! # Suite Orchestrator
//!
//! Ties discovery, selection and execution together for one invocation and
//! produces the [`SuiteReport`].
//!
//! ## Flow
//!
//! 1. Merge search locations: config `search_paths`, then suite `search_paths`
//! 2. Discover one catalog from the merged locations
//! 3. Build the plan: resolve each suite entry through the selector, or take
//!    every catalog entry when the suite names none
//! 4. Collect host metadata once
//! 5. Run each planned benchmark and concatenate its results in order
//!
//! ## Error Handling
//!
//! Unresolvable entries and configuration problems of a single benchmark are
//! logged and skipped. A lifecycle failure stops the remaining parameter sets
//! of that benchmark; the sets that already finished stay in the report.
//! With `continue_on_error` set to `false` the run stops with the failure
//! instead and no report is produced.

use crate::{
    benchmark::{BenchmarkRunner, RunError},
    config::{Config, SuiteDocument},
    discovery::{BenchmarkDescriptor, Catalog, Discovery},
    results::{HostMetadata, SuiteReport},
    selector,
};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Runs a suite against a fixed set of module sources.
#[derive(Default)]
pub struct SuiteRunner {
    discovery: Discovery,
}

impl SuiteRunner {
    pub fn new(discovery: Discovery) -> Self {
        Self { discovery }
    }

    /// Discover the catalog visible to `config` and `suite`.
    pub fn catalog(&self, config: &Config, suite: &SuiteDocument) -> Result<Catalog> {
        Ok(self.discovery.discover(&search_paths(config, suite)?))
    }

    pub fn run(&self, config: &Config, suite: &SuiteDocument) -> Result<SuiteReport> {
        let search_paths = search_paths(config, suite)?;
        let mut config = config.clone();
        config.set_search_paths(&search_paths);

        let catalog = self.discovery.discover(&search_paths);
        info!("Discovered {} benchmark(s)", catalog.len());

        let plan = plan(&catalog, suite);
        let metadata = HostMetadata::collect();
        let continue_on_error = config.continue_on_error();

        let mut results = Vec::new();
        for descriptor in &plan {
            let runner = BenchmarkRunner::for_descriptor(descriptor, &config);
            let outcome = runner.run_completed(&descriptor.parameters);
            let mut produced = outcome.results;
            match outcome.error {
                None => {
                    info!(
                        "Benchmark {} completed with {} result(s)",
                        descriptor.name,
                        produced.len()
                    );
                }
                Some(e @ RunError::Config { .. }) | Some(e @ RunError::InvalidParameters { .. }) => {
                    warn!("Skipping benchmark {}: {}", descriptor.name, e);
                }
                Some(e) => {
                    error!("Benchmark failed for {}: {}", descriptor.name, e);
                    if !continue_on_error {
                        return Err(e.into());
                    }
                    if !produced.is_empty() {
                        info!(
                            "Keeping {} completed result(s) of {}",
                            produced.len(),
                            descriptor.name
                        );
                    }
                }
            }
            results.append(&mut produced);
        }

        Ok(SuiteReport {
            config: config.into_map(),
            metadata,
            results,
        })
    }
}

fn search_paths(config: &Config, suite: &SuiteDocument) -> Result<Vec<PathBuf>> {
    let mut paths = config.search_paths()?;
    paths.extend(suite.search_paths.iter().cloned());
    Ok(paths)
}

/// Descriptors to run, in suite order, with their overrides applied.
fn plan(catalog: &Catalog, suite: &SuiteDocument) -> Vec<BenchmarkDescriptor> {
    let Some(entries) = &suite.benchmarks else {
        return catalog
            .iter()
            .map(|d| d.with_overrides(d.config.clone(), d.class.default_parameter_sets()))
            .collect();
    };

    let mut planned = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(name) = entry.name.as_deref() else {
            warn!("Suite entry {} has no benchmark name, skipping", index + 1);
            continue;
        };
        match selector::resolve(catalog, name) {
            Ok(descriptor) => {
                let parameters = entry
                    .parameters
                    .clone()
                    .unwrap_or_else(|| descriptor.class.default_parameter_sets());
                planned.push(descriptor.with_overrides(entry.config.clone(), parameters));
            }
            Err(e) => warn!("{}", e),
        }
    }
    planned
}

/// Run `suite` with manifest discovery over the configured search paths.
pub fn run_benchmarks(config: &Config, suite: &SuiteDocument) -> Result<SuiteReport> {
    SuiteRunner::default().run(config, suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteEntry;
    use crate::discovery::StaticModules;
    use crate::plugin::{
        Benchmark, BenchmarkDefinition, Interpretation, IterationResult, MetricDescriptor,
        MetricMap, ParameterSet, RunFailure,
    };
    use serde_json::{json, Value};

    #[derive(Default)]
    struct Steady;

    impl Benchmark for Steady {
        fn run(&mut self, parameters: &ParameterSet) -> Result<IterationResult, RunFailure> {
            let value = parameters.get("value").and_then(Value::as_f64).unwrap_or(1.0);
            Ok(IterationResult::from([("value".to_string(), value)]))
        }
    }

    impl BenchmarkDefinition for Steady {
        const NAME: &'static str = "Steady";
        const VERSION: u32 = 1;

        fn metrics() -> MetricMap {
            MetricMap::from([(
                "value".to_string(),
                MetricDescriptor::new("units", Interpretation::Neutral, ""),
            )])
        }

        fn default_parameter_sets() -> Vec<ParameterSet> {
            vec![
                json!({"value": 2}).as_object().cloned().unwrap_or_default(),
                json!({"value": 3}).as_object().cloned().unwrap_or_default(),
            ]
        }
    }

    #[derive(Default)]
    struct BrokenSetup;

    impl Benchmark for BrokenSetup {
        fn setup(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("device busy")
        }

        fn run(&mut self, _: &ParameterSet) -> Result<IterationResult, RunFailure> {
            Ok(IterationResult::new())
        }
    }

    impl BenchmarkDefinition for BrokenSetup {
        const NAME: &'static str = "BrokenSetup";
        const VERSION: u32 = 1;

        fn metrics() -> MetricMap {
            MetricMap::new()
        }
    }

    fn runner() -> SuiteRunner {
        SuiteRunner::new(Discovery::empty().with_source(
            StaticModules::new()
                .module("mods", "steady", |r| {
                    r.register::<Steady>();
                    Ok(())
                })
                .module("mods", "broken", |r| {
                    r.register::<BrokenSetup>();
                    Ok(())
                }),
        ))
    }

    fn config(value: Value) -> Config {
        Config::from_map(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_without_entries_runs_catalog_with_defaults() {
        let report = runner()
            .run(
                &config(json!({"runs": 2, "search_paths": ["mods"]})),
                &SuiteDocument::default(),
            )
            .unwrap();

        let steady: Vec<_> = report.results_for("steady.Steady").collect();
        assert_eq!(steady.len(), 2);
        assert_eq!(steady[0].data["value"], vec![2.0, 2.0]);
        assert_eq!(steady[1].data["value"], vec![3.0, 3.0]);
        assert_eq!(report.results_for("broken.BrokenSetup").count(), 0);
    }

    #[test]
    fn test_entry_overrides_config_and_parameters() {
        let suite = SuiteDocument {
            search_paths: vec![PathBuf::from("mods")],
            benchmarks: Some(vec![SuiteEntry {
                name: Some("Steady".to_string()),
                config: json!({"runs": 3}).as_object().cloned().unwrap(),
                parameters: Some(vec![json!({"value": 7}).as_object().cloned().unwrap()]),
            }]),
        };

        let report = runner().run(&config(json!({"runs": 1})), &suite).unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].data["value"], vec![7.0, 7.0, 7.0]);
        assert_eq!(report.results[0].config["runs"], 3);
        assert_eq!(report.config["runs"], 1);
        assert_eq!(report.config["search_paths"], json!(["mods"]));
    }

    #[test]
    fn test_unresolvable_and_nameless_entries_are_skipped() {
        let suite = SuiteDocument {
            search_paths: vec![PathBuf::from("mods")],
            benchmarks: Some(vec![
                SuiteEntry::named("DoesNotExist"),
                SuiteEntry::default(),
                SuiteEntry::named("steady.Steady"),
            ]),
        };

        let report = runner().run(&config(json!({"runs": 1})), &suite).unwrap();
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.name == "steady.Steady"));
    }

    #[test]
    fn test_lifecycle_failure_aborts_without_continue_on_error() {
        let suite = SuiteDocument {
            search_paths: vec![PathBuf::from("mods")],
            benchmarks: Some(vec![SuiteEntry::named("BrokenSetup")]),
        };

        let err = runner()
            .run(&config(json!({"runs": 1, "continue_on_error": false})), &suite)
            .unwrap_err();
        assert!(err.to_string().contains("device busy"));
    }

    #[test]
    fn test_missing_runs_skips_benchmark() {
        let suite = SuiteDocument {
            search_paths: vec![PathBuf::from("mods")],
            benchmarks: Some(vec![SuiteEntry::named("Steady")]),
        };

        let report = runner().run(&config(json!({})), &suite).unwrap();
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_catalog_merges_search_paths() {
        let suite = SuiteDocument {
            search_paths: vec![PathBuf::from("mods")],
            benchmarks: None,
        };
        let catalog = runner().catalog(&Config::new(), &suite).unwrap();
        assert_eq!(catalog.names(), vec!["steady.Steady", "broken.BrokenSetup"]);
    }
}
