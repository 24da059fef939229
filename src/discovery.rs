//! # Benchmark Discovery
//!
//! Builds the catalog of runnable benchmarks from an ordered list of search
//! locations. Discovery is a pure function of its inputs: the configured
//! [`ModuleSource`]s and the search paths passed to [`Discovery::discover`].
//! Nothing global is mutated.
//!
//! ## Modules
//!
//! A module source lists the loadable modules found at a location. Each
//! module registers its benchmark types explicitly through a [`Registrar`];
//! the registered types become [`BenchmarkDescriptor`]s named
//! `"<module-qualifier>.<type-name>"`.
//!
//! A module that fails to load is logged and skipped. Its partial
//! registrations are discarded, and discovery carries on with the next
//! module.

use crate::plugin::{class_of, BenchmarkDefinition, ClassRef, ManifestModules, ParameterSet};
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a single module can fail to load.
#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("failed to read module {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse module {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid benchmark '{name}': {reason}")]
    InvalidBenchmark { name: String, reason: String },

    #[error("registration failed: {0}")]
    Registration(String),
}

/// One loadable unit found at a search location.
pub trait BenchmarkModule {
    /// Qualifier prefixed to every benchmark type the module registers.
    fn qualifier(&self) -> &str;

    fn load(&self, registrar: &mut Registrar) -> Result<(), ModuleLoadError>;
}

/// Strategy for listing the modules available at a search location.
pub trait ModuleSource {
    /// List modules at `location`, in a deterministic order.
    ///
    /// A location this source has nothing to offer for yields an empty list;
    /// errors are reserved for locations that exist but cannot be read.
    fn scan(&self, location: &Path) -> io::Result<Vec<Box<dyn BenchmarkModule>>>;
}

/// Collects the benchmark types a module registers.
pub struct Registrar {
    qualifier: String,
    classes: Vec<ClassRef>,
}

impl Registrar {
    fn new(qualifier: &str) -> Self {
        Self {
            qualifier: qualifier.to_string(),
            classes: Vec::new(),
        }
    }

    /// Register a statically defined benchmark type.
    pub fn register<T: BenchmarkDefinition>(&mut self) -> &mut Self {
        self.register_class(class_of::<T>())
    }

    pub fn register_class(&mut self, class: ClassRef) -> &mut Self {
        self.classes.push(class);
        self
    }
}

/// A named, instantiable benchmark plus the overrides it runs with.
#[derive(Clone)]
pub struct BenchmarkDescriptor {
    pub name: String,
    pub class: ClassRef,
    pub config: Map<String, Value>,
    pub parameters: Vec<ParameterSet>,
}

impl BenchmarkDescriptor {
    pub fn new(name: impl Into<String>, class: ClassRef) -> Self {
        Self {
            name: name.into(),
            class,
            config: Map::new(),
            parameters: Vec::new(),
        }
    }

    /// Derive a descriptor for the same class with replaced overrides.
    pub fn with_overrides(
        &self,
        config: Map<String, Value>,
        parameters: Vec<ParameterSet>,
    ) -> Self {
        Self {
            name: self.name.clone(),
            class: Arc::clone(&self.class),
            config,
            parameters,
        }
    }
}

impl fmt::Debug for BenchmarkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkDescriptor")
            .field("name", &self.name)
            .field("version", &self.class.version())
            .field("config", &self.config)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// The benchmarks discovered for one run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<BenchmarkDescriptor>,
}

impl Catalog {
    pub fn new(entries: Vec<BenchmarkDescriptor>) -> Self {
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BenchmarkDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a BenchmarkDescriptor;
    type IntoIter = std::slice::Iter<'a, BenchmarkDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

type RegisterFn = dyn Fn(&mut Registrar) -> anyhow::Result<()> + Send + Sync;

/// In-process modules, each bound to the search location it is served from.
#[derive(Default)]
pub struct StaticModules {
    modules: Vec<StaticModule>,
}

struct StaticModule {
    location: PathBuf,
    qualifier: String,
    register: Arc<RegisterFn>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a module named `qualifier` from `location`.
    pub fn module<F>(
        mut self,
        location: impl Into<PathBuf>,
        qualifier: impl Into<String>,
        register: F,
    ) -> Self
    where
        F: Fn(&mut Registrar) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.modules.push(StaticModule {
            location: location.into(),
            qualifier: qualifier.into(),
            register: Arc::new(register),
        });
        self
    }
}

struct StaticModuleHandle {
    qualifier: String,
    register: Arc<RegisterFn>,
}

impl BenchmarkModule for StaticModuleHandle {
    fn qualifier(&self) -> &str {
        &self.qualifier
    }

    fn load(&self, registrar: &mut Registrar) -> Result<(), ModuleLoadError> {
        (self.register)(registrar).map_err(|e| ModuleLoadError::Registration(format!("{:#}", e)))
    }
}

impl ModuleSource for StaticModules {
    fn scan(&self, location: &Path) -> io::Result<Vec<Box<dyn BenchmarkModule>>> {
        Ok(self
            .modules
            .iter()
            .filter(|m| m.location == location)
            .map(|m| {
                Box::new(StaticModuleHandle {
                    qualifier: m.qualifier.clone(),
                    register: Arc::clone(&m.register),
                }) as Box<dyn BenchmarkModule>
            })
            .collect())
    }
}

/// Discovery front end holding the module sources to consult.
pub struct Discovery {
    sources: Vec<Box<dyn ModuleSource>>,
}

impl Default for Discovery {
    /// Discovery over benchmark manifests on disk.
    fn default() -> Self {
        Self::empty().with_source(ManifestModules)
    }
}

impl Discovery {
    /// Discovery with no module sources at all.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Build a catalog from `search_paths`, visited in order.
    pub fn discover(&self, search_paths: &[PathBuf]) -> Catalog {
        let mut entries = Vec::new();

        for location in search_paths {
            debug!("Scanning {} for benchmark modules", location.display());
            for source in &self.sources {
                let modules = match source.scan(location) {
                    Ok(modules) => modules,
                    Err(e) => {
                        warn!("Failed to scan {}: {}", location.display(), e);
                        continue;
                    }
                };

                for module in modules {
                    let mut registrar = Registrar::new(module.qualifier());
                    if let Err(e) = module.load(&mut registrar) {
                        warn!("Failed to load module {}: {}", module.qualifier(), e);
                        continue;
                    }

                    for class in registrar.classes {
                        let name = format!("{}.{}", registrar.qualifier, class.type_name());
                        info!("Found benchmark {}", name);
                        entries.push(BenchmarkDescriptor::new(name, class));
                    }
                }
            }
        }

        Catalog::new(entries)
    }
}
