//! Per-test coverage collection.

mod orchestrator;

use std::future::Future;
use std::path::Path;

use crate::core::{CancellationToken, Result, TestId};

pub use orchestrator::{Orchestrator, OrchestratorConfig, RunFailure, RunOutcome};

/// Runs exactly one test and returns its raw coverage profile text.
pub trait TestRunner: Send + Sync + 'static {
    /// Run `test` in isolation, writing coverage to `artifact`.
    ///
    /// Implementations must return [`crate::core::Error::Cancelled`] promptly
    /// once `cancel` fires and must not leave the child process running.
    fn run_for_coverage(
        &self,
        test: &TestId,
        artifact: &Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`, one for one.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Artifact file name for a test: `cov_<sanitized qualified name>.out`.
///
/// The full import path is used so that tests sharing a name in packages
/// with the same last path segment never write to the same file.
pub fn artifact_name(test: &TestId) -> String {
    format!("cov_{}.out", sanitize(&test.qualified_name()))
}
