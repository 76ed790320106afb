//! Baseline (must-keep) test specifications.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::TestLister;
use crate::core::{Error, Result, TestId};

/// A baseline entry: a whole package, or the tests of a package whose
/// names start with `test_pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSpec {
    /// Package path (e.g. `./uat` or `./uat/...`).
    pub package: String,
    /// Test name prefix. `None` selects every test in the package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_pattern: Option<String>,
}

impl BaselineSpec {
    /// Every test in `package` is baseline.
    pub fn package(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            test_pattern: None,
        }
    }

    /// Tests in `package` whose names start with `prefix` are baseline.
    pub fn pattern(package: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            test_pattern: Some(prefix.into()),
        }
    }

    /// Parse a `pkg=Prefix` command-line argument.
    pub fn parse_pattern_arg(arg: &str) -> Result<Self> {
        match arg.split_once('=') {
            Some((pkg, prefix)) if !pkg.trim().is_empty() && !prefix.trim().is_empty() => {
                Ok(Self::pattern(pkg.trim(), prefix.trim()))
            }
            _ => Err(Error::InvalidArgument(format!(
                "baseline pattern must look like pkg=Prefix, got {arg:?}"
            ))),
        }
    }
}

impl fmt::Display for BaselineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test_pattern {
            Some(prefix) => write!(f, "{}={prefix}", self.package),
            None => f.write_str(&self.package),
        }
    }
}

/// Resolved baseline membership: exact test identities plus per-package
/// name prefixes.
#[derive(Debug, Clone, Default)]
pub struct BaselineSet {
    exact: HashSet<TestId>,
    prefixes: BTreeMap<String, Vec<String>>,
}

impl BaselineSet {
    /// Create an empty baseline set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one test as baseline.
    pub fn add_exact(&mut self, test: TestId) {
        self.exact.insert(test);
    }

    /// Mark every test in `package` whose name starts with `prefix` as baseline.
    pub fn add_prefix(&mut self, package: impl Into<String>, prefix: impl Into<String>) {
        self.prefixes
            .entry(package.into())
            .or_default()
            .push(prefix.into());
    }

    /// Number of exact baseline tests.
    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    /// Number of prefix patterns.
    pub fn pattern_count(&self) -> usize {
        self.prefixes.values().map(Vec::len).sum()
    }

    /// Whether no baseline was configured.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Whether `test` is baseline.
    pub fn contains(&self, test: &TestId) -> bool {
        self.exact.contains(test)
            || self
                .prefixes
                .get(&test.package)
                .is_some_and(|prefixes| prefixes.iter().any(|p| test.name.starts_with(p.as_str())))
    }

    /// Split `tests` into (baseline, non-baseline), preserving order.
    pub fn partition(&self, tests: Vec<TestId>) -> (Vec<TestId>, Vec<TestId>) {
        tests.into_iter().partition(|t| self.contains(t))
    }

    /// Resolve specs into a baseline set.
    ///
    /// Pattern specs need their package resolved to an import path, and a
    /// failure to do so is fatal. Whole-package specs are listed; a listing
    /// failure only produces a warning.
    pub async fn resolve<L: TestLister>(specs: &[BaselineSpec], lister: &L) -> Result<Self> {
        let mut set = Self::new();

        for spec in specs {
            match &spec.test_pattern {
                Some(prefix) => {
                    let package = lister.resolve_package(&spec.package).await.map_err(|e| {
                        Error::stage(
                            "Resolving baseline package",
                            format!("{}: {e}", spec.package),
                        )
                    })?;
                    tracing::debug!("Baseline pattern {package}:{prefix}*");
                    set.add_prefix(package, prefix.clone());
                }
                None => match lister.list_tests(&spec.package).await {
                    Ok(tests) => {
                        for test in tests {
                            set.add_exact(test);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Couldn't list baseline tests in {}: {e}", spec.package);
                    }
                },
            }
        }

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLister;

    impl TestLister for FakeLister {
        async fn list_tests(&self, pattern: &str) -> Result<Vec<TestId>> {
            match pattern {
                "./uat" => Ok(vec![
                    TestId::new("example.com/m/uat", "TestFlowA"),
                    TestId::new("example.com/m/uat", "TestFlowB"),
                ]),
                _ => Err(Error::stage("Listing tests", format!("no packages for {pattern}"))),
            }
        }

        async fn resolve_package(&self, package: &str) -> Result<String> {
            match package {
                "./calc" => Ok("example.com/m/calc".to_string()),
                _ => Err(Error::stage("Resolving package", package.to_string())),
            }
        }
    }

    #[test]
    fn test_contains_exact_and_prefix() {
        let mut set = BaselineSet::new();
        set.add_exact(TestId::new("p", "TestExact"));
        set.add_prefix("q", "TestUAT");

        assert!(set.contains(&TestId::new("p", "TestExact")));
        assert!(!set.contains(&TestId::new("p", "TestOther")));
        assert!(set.contains(&TestId::new("q", "TestUATLogin")));
        assert!(!set.contains(&TestId::new("p", "TestUATLogin")));
        assert_eq!(set.exact_count(), 1);
        assert_eq!(set.pattern_count(), 1);
    }

    #[test]
    fn test_partition_preserves_order() {
        let mut set = BaselineSet::new();
        set.add_prefix("p", "TestB");
        let tests = vec![
            TestId::new("p", "TestA1"),
            TestId::new("p", "TestB1"),
            TestId::new("p", "TestA2"),
            TestId::new("p", "TestB2"),
        ];
        let (baseline, rest) = set.partition(tests);
        assert_eq!(baseline, vec![TestId::new("p", "TestB1"), TestId::new("p", "TestB2")]);
        assert_eq!(rest, vec![TestId::new("p", "TestA1"), TestId::new("p", "TestA2")]);
    }

    #[test]
    fn test_parse_pattern_arg() {
        assert_eq!(
            BaselineSpec::parse_pattern_arg("./calc=TestUAT").unwrap(),
            BaselineSpec::pattern("./calc", "TestUAT")
        );
        assert!(BaselineSpec::parse_pattern_arg("./calc").is_err());
        assert!(BaselineSpec::parse_pattern_arg("=TestX").is_err());
        assert_eq!(BaselineSpec::pattern("./calc", "TestUAT").to_string(), "./calc=TestUAT");
    }

    #[tokio::test]
    async fn test_resolve_specs() {
        let specs = vec![
            BaselineSpec::package("./uat"),
            BaselineSpec::package("./missing"),
            BaselineSpec::pattern("./calc", "TestGolden"),
        ];
        let set = BaselineSet::resolve(&specs, &FakeLister).await.unwrap();
        assert_eq!(set.exact_count(), 2);
        assert!(set.contains(&TestId::new("example.com/m/uat", "TestFlowB")));
        assert!(set.contains(&TestId::new("example.com/m/calc", "TestGoldenAdd")));
        assert!(!set.contains(&TestId::new("example.com/m/calc", "TestAdd")));
    }

    #[tokio::test]
    async fn test_resolve_pattern_failure_is_fatal() {
        let specs = vec![BaselineSpec::pattern("./nowhere", "TestX")];
        let err = BaselineSet::resolve(&specs, &FakeLister).await.unwrap_err();
        assert!(matches!(err, Error::Discovery { .. }));
    }
}
