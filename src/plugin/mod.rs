//! # Benchmark Contract
//!
//! Every benchmark the harness can run satisfies the capability set defined
//! here. The contract is split in two:
//!
//! - [`BenchmarkClass`]: the type-level side (version, metric descriptors,
//!   metadata, default parameter sets) plus a constructor for fresh instances.
//! - [`Benchmark`]: the instance-level lifecycle hooks driven by the engine.
//!
//! Plugins written in Rust usually implement [`BenchmarkDefinition`] instead,
//! which bundles both sides onto one `Default` type and is adapted to a
//! `BenchmarkClass` when it is registered.
//!
//! ## Lifecycle
//!
//! For each parameter set the engine constructs one instance and calls
//! `setup()` once, then `pre_run()`, `run()` and `post_run()` once per
//! iteration, then `teardown()` once. `post_run()` is called even when
//! `run()` failed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub mod command;

pub use command::{CommandClass, CommandSpec, ManifestModules};

/// Named inputs for a single `run` invocation.
pub type ParameterSet = Map<String, Value>;

/// Free-form, JSON-compatible metadata attached to a benchmark type.
pub type Metadata = Map<String, Value>;

/// One scalar value for one metric.
pub type Sample = f64;

/// The samples produced by one successful `run` invocation.
pub type IterationResult = BTreeMap<String, Sample>;

/// Metric descriptors declared by a benchmark type, keyed by metric name.
pub type MetricMap = BTreeMap<String, MetricDescriptor>;

/// Shared handle to an instantiable benchmark type.
pub type ClassRef = Arc<dyn BenchmarkClass>;

/// How a metric's values should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpretation {
    #[serde(rename = "lower is better", alias = "lower-is-better")]
    LowerIsBetter,
    #[serde(rename = "higher is better", alias = "higher-is-better")]
    HigherIsBetter,
    #[serde(rename = "neutral")]
    Neutral,
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpretation::LowerIsBetter => write!(f, "lower is better"),
            Interpretation::HigherIsBetter => write!(f, "higher is better"),
            Interpretation::Neutral => write!(f, "neutral"),
        }
    }
}

/// Static description of one metric a benchmark reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub unit: String,
    pub interpretation: Interpretation,
    #[serde(default)]
    pub description: String,
}

impl MetricDescriptor {
    pub fn new(
        unit: impl Into<String>,
        interpretation: Interpretation,
        description: impl Into<String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            interpretation,
            description: description.into(),
        }
    }
}

/// Lifecycle stages the engine drives, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Setup,
    PreRun,
    Run,
    PostRun,
    Teardown,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Setup => write!(f, "setup"),
            Hook::PreRun => write!(f, "pre_run"),
            Hook::Run => write!(f, "run"),
            Hook::PostRun => write!(f, "post_run"),
            Hook::Teardown => write!(f, "teardown"),
        }
    }
}

/// Failure of a single `run` invocation.
///
/// Carries the samples the iteration managed to produce before failing, so
/// the engine can tell "nothing measured" apart from "partially measured".
/// Any error convertible into `anyhow::Error` converts into a `RunFailure`
/// without partial samples, which keeps `?` usable inside `run` bodies.
#[derive(Debug)]
pub struct RunFailure {
    error: anyhow::Error,
    partial: IterationResult,
}

impl RunFailure {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            partial: IterationResult::new(),
        }
    }

    /// Attach the samples collected before the failure.
    pub fn with_partial(mut self, partial: IterationResult) -> Self {
        self.partial = partial;
        self
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn partial(&self) -> &IterationResult {
        &self.partial
    }

    pub fn has_partial_samples(&self) -> bool {
        !self.partial.is_empty()
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl<E> From<E> for RunFailure
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

/// Instance lifecycle hooks.
///
/// Only `run` must be provided. Its return value is the only thing that
/// feeds aggregation.
pub trait Benchmark {
    fn setup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn pre_run(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn run(&mut self, parameters: &ParameterSet) -> Result<IterationResult, RunFailure>;

    fn post_run(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Type-level side of the contract, object safe so the catalog can hold
/// heterogeneous benchmark types.
pub trait BenchmarkClass: Send + Sync {
    /// Unqualified type name; discovery prefixes the module qualifier.
    fn type_name(&self) -> &str;

    /// Schema version of the metric semantics.
    fn version(&self) -> u32;

    fn metrics(&self) -> MetricMap;

    fn metadata(&self) -> Metadata {
        Metadata::new()
    }

    fn default_parameter_sets(&self) -> Vec<ParameterSet> {
        Vec::new()
    }

    /// Parameter names `run` accepts. `None` disables key validation.
    fn accepted_parameters(&self) -> Option<Vec<String>> {
        None
    }

    /// Construct a fresh instance for one parameter set.
    fn instantiate(&self) -> anyhow::Result<Box<dyn Benchmark>>;
}

/// Statically typed benchmark definition.
///
/// ```rust
/// use tailleur::plugin::{
///     Benchmark, BenchmarkDefinition, Interpretation, IterationResult, MetricDescriptor,
///     MetricMap, ParameterSet, RunFailure,
/// };
///
/// #[derive(Default)]
/// struct Noop;
///
/// impl Benchmark for Noop {
///     fn run(&mut self, _: &ParameterSet) -> Result<IterationResult, RunFailure> {
///         Ok(IterationResult::from([("elapsed".to_string(), 0.0)]))
///     }
/// }
///
/// impl BenchmarkDefinition for Noop {
///     const NAME: &'static str = "Noop";
///     const VERSION: u32 = 1;
///
///     fn metrics() -> MetricMap {
///         MetricMap::from([(
///             "elapsed".to_string(),
///             MetricDescriptor::new("seconds", Interpretation::LowerIsBetter, "Nothing"),
///         )])
///     }
/// }
/// ```
pub trait BenchmarkDefinition: Benchmark + Default + 'static {
    const NAME: &'static str;
    const VERSION: u32;

    fn metrics() -> MetricMap;

    fn metadata() -> Metadata {
        Metadata::new()
    }

    fn default_parameter_sets() -> Vec<ParameterSet> {
        Vec::new()
    }

    fn accepted_parameters() -> Option<&'static [&'static str]> {
        None
    }
}

/// Adapter exposing a [`BenchmarkDefinition`] as a [`BenchmarkClass`].
pub struct DefinedClass<T>(PhantomData<fn() -> T>);

impl<T> Default for DefinedClass<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: BenchmarkDefinition> BenchmarkClass for DefinedClass<T> {
    fn type_name(&self) -> &str {
        T::NAME
    }

    fn version(&self) -> u32 {
        T::VERSION
    }

    fn metrics(&self) -> MetricMap {
        T::metrics()
    }

    fn metadata(&self) -> Metadata {
        T::metadata()
    }

    fn default_parameter_sets(&self) -> Vec<ParameterSet> {
        T::default_parameter_sets()
    }

    fn accepted_parameters(&self) -> Option<Vec<String>> {
        T::accepted_parameters().map(|names| names.iter().map(|n| n.to_string()).collect())
    }

    fn instantiate(&self) -> anyhow::Result<Box<dyn Benchmark>> {
        Ok(Box::new(T::default()))
    }
}

/// Shared class handle for a statically defined benchmark.
pub fn class_of<T: BenchmarkDefinition>() -> ClassRef {
    Arc::new(DefinedClass::<T>::default())
}
