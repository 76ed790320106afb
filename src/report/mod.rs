//! Selection report: kept and redundant tests, run failures and warnings.

mod render;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::TestId;
use crate::runner::RunFailure;
use crate::selector::{BaselinePolicy, KeptTest, Selection, Shortfall};

pub use render::{render_markdown, render_text};

/// A non-fatal condition surfaced alongside the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The full suite reaches threshold on this function but no selection
    /// step could bring the kept set there.
    UnreachableTarget { function: String },
    /// The recomputed coverage of the kept set is below threshold.
    ValidationShortfall {
        function: String,
        percent: f64,
        missing: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableTarget { function } => {
                write!(f, "unreachable target {function}")
            }
            Self::ValidationShortfall {
                function,
                percent,
                missing,
            } => write!(
                f,
                "{function} only reaches {percent:.1}% ({missing:.1} points short)"
            ),
        }
    }
}

impl From<Shortfall> for Warning {
    fn from(s: Shortfall) -> Self {
        Self::ValidationShortfall {
            function: s.function,
            percent: s.percent,
            missing: s.missing,
        }
    }
}

/// Counts gathered while discovering and running tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub discovered: usize,
    pub baseline: usize,
    pub non_baseline: usize,
    pub parallel_safe: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Functions reaching the threshold with every test merged.
    pub targets: usize,
}

/// The machine-facing result: qualified names only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub kept_tests: Vec<String>,
    pub redundant_tests: Vec<String>,
}

/// Full report of one `find` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub package: String,
    pub threshold: f64,
    pub policy: BaselinePolicy,
    pub summary: RunSummary,
    /// Kept tests in selection order.
    pub kept: Vec<KeptTest>,
    /// Baseline tests that could be trimmed, sorted by package then name.
    pub redundant_baseline: Vec<TestId>,
    /// Non-baseline tests that are redundant, sorted by package then name.
    pub redundant_non_baseline: Vec<TestId>,
    pub run_failures: Vec<RunFailure>,
    pub warnings: Vec<Warning>,
}

impl Report {
    /// An empty report for `package`.
    pub fn new(package: impl Into<String>, threshold: f64, policy: BaselinePolicy) -> Self {
        Self {
            package: package.into(),
            threshold,
            policy,
            summary: RunSummary::default(),
            kept: Vec::new(),
            redundant_baseline: Vec::new(),
            redundant_non_baseline: Vec::new(),
            run_failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Fill in selection and validation outcomes.
    pub fn with_selection(mut self, selection: Selection, shortfalls: Vec<Shortfall>) -> Self {
        let (mut baseline, mut non_baseline): (Vec<_>, Vec<_>) =
            selection.redundant.into_iter().partition(|r| r.baseline);
        baseline.sort_by(|a, b| a.test.cmp(&b.test));
        non_baseline.sort_by(|a, b| a.test.cmp(&b.test));

        self.kept = selection.kept;
        self.redundant_baseline = baseline.into_iter().map(|r| r.test).collect();
        self.redundant_non_baseline = non_baseline.into_iter().map(|r| r.test).collect();
        self.warnings.extend(
            selection
                .unreachable
                .into_iter()
                .map(|function| Warning::UnreachableTarget { function }),
        );
        self.warnings
            .extend(shortfalls.into_iter().map(Warning::from));
        self
    }

    /// Kept tests split into (baseline, non-baseline) counts.
    pub fn kept_counts(&self) -> (usize, usize) {
        let baseline = self.kept.iter().filter(|k| k.baseline).count();
        (baseline, self.kept.len() - baseline)
    }

    /// Validation shortfalls only.
    pub fn shortfalls(&self) -> impl Iterator<Item = &Warning> {
        self.warnings
            .iter()
            .filter(|w| matches!(w, Warning::ValidationShortfall { .. }))
    }

    /// Whether the kept set was confirmed to hold every reachable target.
    pub fn validation_passed(&self) -> bool {
        self.shortfalls().next().is_none()
    }

    /// Qualified names of kept and redundant tests.
    pub fn result(&self) -> SelectionResult {
        SelectionResult {
            kept_tests: self.kept.iter().map(|k| k.test.qualified_name()).collect(),
            redundant_tests: self
                .redundant_baseline
                .iter()
                .chain(&self.redundant_non_baseline)
                .map(TestId::qualified_name)
                .collect(),
        }
    }
}
