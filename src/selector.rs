//! Benchmark name resolution against a discovered catalog.
//!
//! A requested name matches a catalog entry when it equals the entry's
//! qualified name, or, for unqualified requests only, when the entry's name
//! ends with `".<requested>"`. Exactly one match is required.

use crate::discovery::{BenchmarkDescriptor, Catalog};
use thiserror::Error;

/// Separator between the module qualifier and the type name.
pub const QUALIFIER_SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("no match for benchmark by name '{name}'")]
    NotFound { name: String },

    #[error(
        "multiple ({}) matches for benchmark by name '{name}': {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
}

/// Resolve `requested` to exactly one catalog entry.
pub fn resolve<'a>(
    catalog: &'a Catalog,
    requested: &str,
) -> Result<&'a BenchmarkDescriptor, SelectError> {
    let unqualified = !requested.contains(QUALIFIER_SEPARATOR);
    let suffix = format!("{}{}", QUALIFIER_SEPARATOR, requested);

    let matches: Vec<&BenchmarkDescriptor> = catalog
        .iter()
        .filter(|d| d.name == requested || (unqualified && d.name.ends_with(&suffix)))
        .collect();

    match matches.as_slice() {
        [] => Err(SelectError::NotFound {
            name: requested.to_string(),
        }),
        [single] => Ok(*single),
        _ => Err(SelectError::Ambiguous {
            name: requested.to_string(),
            candidates: matches.iter().map(|d| d.name.clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{
        Benchmark, BenchmarkClass, IterationResult, MetricMap, ParameterSet, RunFailure,
    };
    use std::sync::Arc;

    struct Stub(&'static str);

    struct StubInstance;

    impl Benchmark for StubInstance {
        fn run(&mut self, _: &ParameterSet) -> Result<IterationResult, RunFailure> {
            Ok(IterationResult::new())
        }
    }

    impl BenchmarkClass for Stub {
        fn type_name(&self) -> &str {
            self.0
        }

        fn version(&self) -> u32 {
            1
        }

        fn metrics(&self) -> MetricMap {
            MetricMap::new()
        }

        fn instantiate(&self) -> anyhow::Result<Box<dyn Benchmark>> {
            Ok(Box::new(StubInstance))
        }
    }

    fn catalog(names: &[(&str, &'static str)]) -> Catalog {
        Catalog::new(
            names
                .iter()
                .map(|(module, ty)| {
                    BenchmarkDescriptor::new(format!("{}.{}", module, ty), Arc::new(Stub(*ty)))
                })
                .collect(),
        )
    }

    #[test]
    fn test_exact_qualified_match() {
        let catalog = catalog(&[("setup", "FirstCommand"), ("setup", "SessionSetupTime")]);
        let found = resolve(&catalog, "setup.SessionSetupTime").unwrap();
        assert_eq!(found.name, "setup.SessionSetupTime");
        assert_eq!(found.class.type_name(), "SessionSetupTime");
    }

    #[test]
    fn test_unqualified_suffix_match() {
        let catalog = catalog(&[("setup", "FirstCommand"), ("other", "Thing")]);
        assert_eq!(resolve(&catalog, "Thing").unwrap().name, "other.Thing");
    }

    #[test]
    fn test_suffix_must_align_with_separator() {
        let catalog = catalog(&[("setup", "SessionStartTime")]);
        assert_eq!(
            resolve(&catalog, "StartTime").unwrap_err(),
            SelectError::NotFound {
                name: "StartTime".to_string()
            }
        );
    }

    #[test]
    fn test_qualified_request_never_suffix_matches() {
        let catalog = catalog(&[("pkg.setup", "FirstCommand")]);
        assert!(resolve(&catalog, "setup.FirstCommand").is_err());
        assert!(resolve(&catalog, "pkg.setup.FirstCommand").is_ok());
    }

    #[test]
    fn test_two_matches_are_ambiguous() {
        let catalog = catalog(&[("a", "Load"), ("b", "Load")]);
        match resolve(&catalog, "Load").unwrap_err() {
            SelectError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, vec!["a.Load".to_string(), "b.Load".to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_qualified_names_are_ambiguous() {
        let catalog = catalog(&[("a", "Load"), ("a", "Load")]);
        assert!(matches!(
            resolve(&catalog, "a.Load"),
            Err(SelectError::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_empty_catalog_not_found() {
        let err = resolve(&Catalog::default(), "Anything").unwrap_err();
        assert_eq!(err.to_string(), "no match for benchmark by name 'Anything'");
    }
}
