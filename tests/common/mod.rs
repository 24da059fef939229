//! Scripted benchmark class shared by the integration tests.
//!
//! Every hook invocation is appended to a shared call log so tests can
//! assert on the exact lifecycle the engine drove.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tailleur::config::Config;
use tailleur::plugin::{
    Benchmark, BenchmarkClass, Interpretation, IterationResult, MetricDescriptor, MetricMap,
    ParameterSet, RunFailure,
};

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Behaviour of a [`Scripted`] benchmark. Iterations are 1-based.
#[derive(Clone, Default)]
pub struct Script {
    pub version: u32,
    pub fail_setup: bool,
    pub fail_setup_on_instance: Option<usize>,
    pub fail_pre_run_at: Option<usize>,
    pub fail_post_run_at: Option<usize>,
    pub fail_teardown: bool,
    pub fail_runs: Vec<usize>,
    pub panic_runs: Vec<usize>,
    pub extra_metric: bool,
    pub defaults: Vec<ParameterSet>,
}

/// Benchmark class reporting `latency = iteration - 1` on every iteration.
pub struct Scripted {
    name: String,
    script: Script,
    calls: CallLog,
}

impl Scripted {
    pub fn new(name: &str, script: Script) -> (Arc<Self>, CallLog) {
        let calls = CallLog::default();
        let class = Arc::new(Self {
            name: name.to_string(),
            script,
            calls: Arc::clone(&calls),
        });
        (class, calls)
    }
}

impl BenchmarkClass for Scripted {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.script.version
    }

    fn metrics(&self) -> MetricMap {
        MetricMap::from([(
            "latency".to_string(),
            MetricDescriptor::new("seconds", Interpretation::LowerIsBetter, "Scripted latency"),
        )])
    }

    fn default_parameter_sets(&self) -> Vec<ParameterSet> {
        self.script.defaults.clone()
    }

    fn instantiate(&self) -> anyhow::Result<Box<dyn Benchmark>> {
        let instance = {
            let mut calls = self.calls.lock().unwrap();
            calls.push("new".to_string());
            calls.iter().filter(|c| *c == "new").count()
        };
        Ok(Box::new(ScriptedInstance {
            script: self.script.clone(),
            calls: Arc::clone(&self.calls),
            instance,
            iteration: 0,
        }))
    }
}

struct ScriptedInstance {
    script: Script,
    calls: CallLog,
    instance: usize,
    iteration: usize,
}

impl ScriptedInstance {
    fn log(&self, hook: &str) {
        self.calls.lock().unwrap().push(hook.to_string());
    }
}

impl Benchmark for ScriptedInstance {
    fn setup(&mut self) -> anyhow::Result<()> {
        self.log("setup");
        if self.script.fail_setup || self.script.fail_setup_on_instance == Some(self.instance) {
            anyhow::bail!("setup refused");
        }
        Ok(())
    }

    fn pre_run(&mut self) -> anyhow::Result<()> {
        self.iteration += 1;
        self.log("pre_run");
        if self.script.fail_pre_run_at == Some(self.iteration) {
            anyhow::bail!("pre_run refused");
        }
        Ok(())
    }

    fn run(&mut self, _: &ParameterSet) -> Result<IterationResult, RunFailure> {
        self.log("run");
        let value = (self.iteration - 1) as f64;
        if self.script.panic_runs.contains(&self.iteration) {
            panic!("scripted panic at iteration {}", self.iteration);
        }
        if self.script.fail_runs.contains(&self.iteration) {
            return Err(RunFailure::new(anyhow::anyhow!("scripted failure"))
                .with_partial(IterationResult::from([("latency".to_string(), value)])));
        }

        let mut result = IterationResult::from([("latency".to_string(), value)]);
        if self.script.extra_metric {
            result.insert("undeclared".to_string(), 1.0);
        }
        Ok(result)
    }

    fn post_run(&mut self) -> anyhow::Result<()> {
        self.log("post_run");
        if self.script.fail_post_run_at == Some(self.iteration) {
            anyhow::bail!("post_run refused");
        }
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        self.log("teardown");
        if self.script.fail_teardown {
            anyhow::bail!("teardown refused");
        }
        Ok(())
    }
}

/// Number of logged calls to `hook`.
pub fn count(calls: &CallLog, hook: &str) -> usize {
    calls.lock().unwrap().iter().filter(|c| *c == hook).count()
}

pub fn config(value: Value) -> Config {
    Config::from_map(value.as_object().cloned().unwrap_or_default())
}

pub fn runs(n: usize) -> Config {
    config(json!({ "runs": n }))
}

pub fn params(value: Value) -> ParameterSet {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a plain-text subscriber and returns what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
    (value, logs)
}

/// Lines of `logs` at WARN level.
pub fn warnings(logs: &str) -> Vec<&str> {
    logs.lines().filter(|line| line.contains("WARN")).collect()
}
