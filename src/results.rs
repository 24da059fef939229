//! # Result Schema and Report Output
//!
//! - [`AggregatedResult`]: the samples of one (benchmark, parameter set)
//!   pair, one ordered sequence per metric.
//! - [`SuiteReport`]: the terminal artifact of one invocation: the effective
//!   configuration, host metadata collected once, and every result in
//!   execution order.
//! - [`ResultsManager`]: writes the report exactly once, to a file or to
//!   stdout.

use crate::plugin::{IterationResult, Metadata, MetricMap, ParameterSet, Sample};
use crate::utils;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Samples of one benchmark run with one parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub name: String,
    pub version: u32,
    pub metrics: MetricMap,
    pub metadata: Metadata,
    pub parameters: ParameterSet,
    /// Samples per metric, in iteration order. Failed iterations contribute
    /// nothing, so sequences may be shorter than the configured run count.
    pub data: BTreeMap<String, Vec<Sample>>,
    pub config: Map<String, Value>,
}

/// Folds per-iteration results into per-metric sample sequences.
pub struct SampleCollector<'a> {
    benchmark: &'a str,
    declared: &'a MetricMap,
    data: BTreeMap<String, Vec<Sample>>,
}

impl<'a> SampleCollector<'a> {
    pub fn new(benchmark: &'a str, declared: &'a MetricMap) -> Self {
        Self {
            benchmark,
            declared,
            data: BTreeMap::new(),
        }
    }

    /// Append one iteration's samples. Undeclared metrics are kept;
    /// NaN and infinite values are dropped since JSON cannot carry them.
    pub fn record(&mut self, iteration: usize, result: IterationResult) {
        for (metric, value) in result {
            if !value.is_finite() {
                warn!(
                    "{} iter {} returned a non-finite value ({}) for metric '{}', dropping it",
                    self.benchmark, iteration, value, metric
                );
                continue;
            }
            if !self.declared.contains_key(&metric) {
                warn!(
                    "{} iter {} returned a metric '{}' not described by its metric descriptors",
                    self.benchmark, iteration, metric
                );
            }
            self.data.entry(metric).or_default().push(value);
        }
    }

    pub fn into_data(self) -> BTreeMap<String, Vec<Sample>> {
        self.data
    }
}

/// `uname`-style platform identification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub system: String,
    pub node: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub processor: String,
}

/// Host facts attached to every report, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMetadata {
    pub platform: PlatformInfo,
    pub processor: Option<String>,
    pub nproc: usize,
    pub cpu_online: Option<String>,
    pub cpu_possible: Option<String>,
    #[serde(rename = "memory_MiB")]
    pub memory_mib: Option<f64>,
    #[serde(rename = "os-release")]
    pub os_release: BTreeMap<String, String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub run_id: String,
    pub harness_version: String,
}

impl HostMetadata {
    /// Collect host facts. Unavailable sources become `None` or empty.
    pub fn collect() -> Self {
        Self {
            platform: utils::platform_info(),
            processor: utils::read_processor_model(),
            nproc: num_cpus::get(),
            cpu_online: utils::read_first_line(utils::CPU_ONLINE_PATH),
            cpu_possible: utils::read_first_line(utils::CPU_POSSIBLE_PATH),
            memory_mib: utils::read_memory_mib(),
            os_release: utils::read_os_release(),
            timestamp: chrono::Utc::now(),
            run_id: utils::generate_run_id(),
            harness_version: crate::VERSION.to_string(),
        }
    }
}

/// The report produced by one suite run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub config: Map<String, Value>,
    pub metadata: HostMetadata,
    pub results: Vec<AggregatedResult>,
}

impl SuiteReport {
    /// Results for one benchmark name, in parameter-set order.
    pub fn results_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AggregatedResult> {
        self.results.iter().filter(move |r| r.name == name)
    }
}

/// Writes the final report to its destination.
pub struct ResultsManager {
    output_file: Option<PathBuf>,
}

impl ResultsManager {
    /// `None` writes to stdout.
    pub fn new(output_file: Option<&Path>) -> Self {
        Self {
            output_file: output_file.map(Path::to_path_buf),
        }
    }

    pub fn write(&self, report: &SuiteReport) -> Result<()> {
        info!(
            "Writing report with {} result(s) from {} benchmark run(s)",
            report.results.len(),
            report
                .results
                .iter()
                .map(|r| r.name.as_str())
                .collect::<std::collections::BTreeSet<_>>()
                .len()
        );

        let json = serde_json::to_string_pretty(report)?;
        match self.output_file {
            Some(ref path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                info!("Results written to: {:?}", path);
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                writeln!(handle, "{}", json)?;
                handle.flush()?;
            }
        }
        Ok(())
    }
}
