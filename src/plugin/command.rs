//! # Command Benchmarks
//!
//! Benchmarks defined declaratively in manifest files instead of Rust code.
//! Every `*.json`, `*.yaml` or `*.yml` file in a search location is one
//! module whose qualifier is the file stem, and every entry of its
//! `benchmarks` list is one benchmark type.
//!
//! ```yaml
//! benchmarks:
//!   - name: SessionLoad
//!     default_parameter_sets:
//!       - session_file: data/session.lttng
//!     parameters: [session_file]
//!     setup: [lttng-sessiond, --daemonize]
//!     run: [lttng, load, --input-path, "{session_file}", --all]
//!     teardown: [lttng, destroy, --all]
//! ```
//!
//! Each hook is an argv list executed without a shell, with the manifest's
//! directory as working directory. Child stdout is sent to stderr so the
//! report stream stays clean. A spawn failure or a non-zero exit status is a
//! hook failure. The `run` command is timed and its wall-clock duration in
//! seconds becomes the sample for `metric` (default `wall_time`). `{key}`
//! placeholders in `run` arguments are replaced from the parameter set;
//! placeholders naming no parameter are left as written.

use super::{
    Benchmark, BenchmarkClass, Hook, Interpretation, IterationResult, Metadata, MetricDescriptor,
    MetricMap, ParameterSet, RunFailure,
};
use crate::discovery::{BenchmarkModule, ModuleLoadError, ModuleSource, Registrar};
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

fn default_version() -> u32 {
    1
}

fn default_metric() -> String {
    crate::defaults::DEFAULT_METRIC.to_string()
}

/// One benchmark entry of a manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandSpec {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub metrics: MetricMap,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub default_parameter_sets: Vec<ParameterSet>,

    /// Accepted parameter names; unset disables validation.
    #[serde(default)]
    pub parameters: Option<Vec<String>>,

    #[serde(default)]
    pub setup: Option<Vec<String>>,

    #[serde(default)]
    pub pre_run: Option<Vec<String>>,

    pub run: Vec<String>,

    #[serde(default)]
    pub post_run: Option<Vec<String>>,

    #[serde(default)]
    pub teardown: Option<Vec<String>>,

    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    fn validate(&self) -> Result<(), ModuleLoadError> {
        let invalid = |reason: &str| ModuleLoadError::InvalidBenchmark {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.name.contains(crate::selector::QUALIFIER_SEPARATOR) {
            return Err(invalid("name must not contain '.'"));
        }
        if self.metric.is_empty() {
            return Err(invalid("metric name must not be empty"));
        }
        if self.run.is_empty() {
            return Err(invalid("run command must not be empty"));
        }
        for (hook, argv) in self.optional_hooks() {
            if matches!(argv, Some(argv) if argv.is_empty()) {
                return Err(invalid(&format!("{} command must not be empty", hook)));
            }
        }
        Ok(())
    }

    fn optional_hooks(&self) -> [(Hook, &Option<Vec<String>>); 4] {
        [
            (Hook::Setup, &self.setup),
            (Hook::PreRun, &self.pre_run),
            (Hook::PostRun, &self.post_run),
            (Hook::Teardown, &self.teardown),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    #[serde(default)]
    benchmarks: Vec<CommandSpec>,
}

/// Benchmark type backed by external commands.
pub struct CommandClass {
    spec: Arc<CommandSpec>,
    workdir: PathBuf,
}

impl CommandClass {
    pub fn new(spec: CommandSpec, workdir: impl Into<PathBuf>) -> Self {
        Self {
            spec: Arc::new(spec),
            workdir: workdir.into(),
        }
    }
}

impl BenchmarkClass for CommandClass {
    fn type_name(&self) -> &str {
        &self.spec.name
    }

    fn version(&self) -> u32 {
        self.spec.version
    }

    /// Declared metrics plus the timed metric, which is described
    /// automatically when the manifest leaves it out.
    fn metrics(&self) -> MetricMap {
        let mut metrics = self.spec.metrics.clone();
        metrics.entry(self.spec.metric.clone()).or_insert_with(|| {
            MetricDescriptor::new(
                "seconds",
                Interpretation::LowerIsBetter,
                "Wall-clock time of the run command",
            )
        });
        metrics
    }

    fn metadata(&self) -> Metadata {
        self.spec.metadata.clone()
    }

    fn default_parameter_sets(&self) -> Vec<ParameterSet> {
        self.spec.default_parameter_sets.clone()
    }

    fn accepted_parameters(&self) -> Option<Vec<String>> {
        self.spec.parameters.clone()
    }

    fn instantiate(&self) -> Result<Box<dyn Benchmark>> {
        Ok(Box::new(CommandBenchmark {
            spec: Arc::clone(&self.spec),
            workdir: self.workdir.clone(),
        }))
    }
}

struct CommandBenchmark {
    spec: Arc<CommandSpec>,
    workdir: PathBuf,
}

impl CommandBenchmark {
    fn hook(&self, hook: Hook, argv: &Option<Vec<String>>) -> Result<()> {
        match argv {
            Some(argv) => self.execute(hook, argv, &ParameterSet::new()).map(|_| ()),
            None => Ok(()),
        }
    }

    fn execute(&self, hook: Hook, argv: &[String], parameters: &ParameterSet) -> Result<Duration> {
        let args: Vec<String> = argv.iter().map(|a| render_arg(a, parameters)).collect();
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("{} command of '{}' is empty", hook, self.spec.name))?;

        let stdout = os_pipe::dup_stderr().context("Failed to duplicate stderr for command output")?;
        let mut cmd = Command::new(program);
        cmd.args(rest)
            .current_dir(&self.workdir)
            .envs(&self.spec.env)
            .stdin(Stdio::null())
            .stdout(stdout);

        debug!("{} {}: {}", self.spec.name, hook, args.join(" "));
        let started = Instant::now();
        let status = cmd
            .status()
            .with_context(|| format!("Failed to spawn '{}' in {}", program, self.workdir.display()))?;
        let elapsed = started.elapsed();

        if !status.success() {
            bail!("'{}' exited with {}", args.join(" "), status);
        }
        Ok(elapsed)
    }
}

impl Benchmark for CommandBenchmark {
    fn setup(&mut self) -> Result<()> {
        self.hook(Hook::Setup, &self.spec.setup)
    }

    fn pre_run(&mut self) -> Result<()> {
        self.hook(Hook::PreRun, &self.spec.pre_run)
    }

    fn run(&mut self, parameters: &ParameterSet) -> Result<IterationResult, RunFailure> {
        let elapsed = self.execute(Hook::Run, &self.spec.run, parameters)?;
        Ok(IterationResult::from([(
            self.spec.metric.clone(),
            elapsed.as_secs_f64(),
        )]))
    }

    fn post_run(&mut self) -> Result<()> {
        self.hook(Hook::PostRun, &self.spec.post_run)
    }

    fn teardown(&mut self) -> Result<()> {
        self.hook(Hook::Teardown, &self.spec.teardown)
    }
}

/// Replace `{key}` placeholders with values from `parameters`.
fn render_arg(arg: &str, parameters: &ParameterSet) -> String {
    let mut rendered = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            rest = tail;
            break;
        };
        match parameters.get(&tail[1..end]) {
            Some(value) => rendered.push_str(&render_value(value)),
            None => rendered.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    rendered.push_str(rest);
    rendered
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Module source serving manifest files from a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestModules;

impl ModuleSource for ManifestModules {
    fn scan(&self, location: &Path) -> io::Result<Vec<Box<dyn BenchmarkModule>>> {
        if !location.is_dir() {
            debug!("{} is not a directory, no manifests", location.display());
            return Ok(Vec::new());
        }

        let mut manifests = Vec::new();
        for entry in std::fs::read_dir(location)? {
            let path = entry?.path();
            if path.is_file() && is_manifest(&path) {
                manifests.push(path);
            }
        }
        manifests.sort();

        Ok(manifests
            .into_iter()
            .filter_map(ManifestModule::new)
            .map(|module| Box::new(module) as Box<dyn BenchmarkModule>)
            .collect())
    }
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MANIFEST_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

struct ManifestModule {
    path: PathBuf,
    qualifier: String,
}

impl ManifestModule {
    fn new(path: PathBuf) -> Option<Self> {
        let qualifier = path.file_stem()?.to_string_lossy().into_owned();
        Some(Self { path, qualifier })
    }

    fn parse(&self, text: &str) -> Result<Manifest, ModuleLoadError> {
        let parsed = match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(text).map_err(|e| e.to_string()),
            _ => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ModuleLoadError::Parse {
            path: self.path.clone(),
            message,
        })
    }
}

impl BenchmarkModule for ManifestModule {
    fn qualifier(&self) -> &str {
        &self.qualifier
    }

    fn load(&self, registrar: &mut Registrar) -> Result<(), ModuleLoadError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| ModuleLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let manifest = self.parse(&text)?;

        let mut seen = Vec::with_capacity(manifest.benchmarks.len());
        for spec in &manifest.benchmarks {
            spec.validate()?;
            if seen.contains(&spec.name.as_str()) {
                return Err(ModuleLoadError::InvalidBenchmark {
                    name: spec.name.clone(),
                    reason: "defined more than once".to_string(),
                });
            }
            seen.push(spec.name.as_str());
        }

        let workdir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        for spec in manifest.benchmarks {
            registrar.register_class(Arc::new(CommandClass::new(spec, workdir.clone())));
        }
        Ok(())
    }
}
