//! Independent re-check of a selection.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::aggregate::CoverageAggregate;
use super::greedy::{Candidate, KeptTest};
use crate::core::TestId;

/// A target that the kept set does not actually bring to threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortfall {
    pub function: String,
    /// Coverage achieved by the kept set (0 when the function has no data).
    pub percent: f64,
    /// Percentage points missing to reach the threshold.
    pub missing: f64,
}

/// Recompute coverage of `kept` from scratch and report every target below
/// `threshold`, skipping functions already known to be unreachable.
pub fn validate<A: CoverageAggregate>(
    candidates: &[Candidate<A>],
    kept: &[KeptTest],
    targets: &BTreeSet<String>,
    unreachable: &[String],
    threshold: f64,
) -> Vec<Shortfall> {
    let by_test: HashMap<&TestId, &A> = candidates
        .iter()
        .map(|c| (&c.test, &c.coverage))
        .collect();

    let mut merged = A::empty();
    for test in kept {
        if let Some(coverage) = by_test.get(&test.test) {
            merged.merge_from(coverage);
        }
    }

    let skip: BTreeSet<&str> = unreachable.iter().map(String::as_str).collect();
    targets
        .iter()
        .filter(|f| !skip.contains(f.as_str()))
        .filter_map(|f| {
            let percent = merged.percent(f).unwrap_or(0.0);
            (percent < threshold).then(|| Shortfall {
                function: f.clone(),
                percent,
                missing: threshold - percent,
            })
        })
        .collect()
}
