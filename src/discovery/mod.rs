//! Test discovery contracts.
//!
//! Listing tests and classifying them as parallel-safe are delegated to
//! collaborators so the pipeline can be driven by the Go toolchain or by
//! in-memory fakes.

mod baseline;

use std::collections::HashSet;
use std::future::Future;

use crate::core::{Result, TestId};

pub use baseline::{BaselineSet, BaselineSpec};

/// Enumerates tests and resolves package patterns.
pub trait TestLister: Send + Sync {
    /// List every test in the packages matched by `pattern`, in discovery order.
    fn list_tests(&self, pattern: &str) -> impl Future<Output = Result<Vec<TestId>>> + Send;

    /// Resolve a relative package path (e.g. `./pkg/parse`) to its import path.
    fn resolve_package(&self, package: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Decides which tests may run concurrently with other tests.
pub trait ParallelClassifier: Send + Sync {
    /// Return the subset of `tests` that is safe to run in parallel.
    ///
    /// Tests that cannot be classified are treated as serial.
    fn classify(&self, tests: &[TestId]) -> impl Future<Output = Result<HashSet<TestId>>> + Send;
}

/// Parse the output of a test listing for `package`.
///
/// Every trimmed line starting with `Test` is a test name; summary lines
/// (`ok ...`) and benchmarks are ignored. Duplicates are dropped.
pub fn parse_test_list(package: &str, output: &str) -> Vec<TestId> {
    let mut seen = HashSet::new();
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("Test"))
        .filter(|line| seen.insert(*line))
        .map(|line| TestId::new(package, line))
        .collect()
}
