//! Gap-driven, baseline-preferring greedy selection.
//!
//! Every iteration scores the remaining candidates against an immutable
//! snapshot of the running aggregate. Baseline candidates are tried first;
//! non-baseline ones only when no baseline candidate improves a gap. The
//! winner has the most improved gaps, ties going to the earliest discovered.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::aggregate::CoverageAggregate;
use crate::core::{CancellationToken, Result, TestId};

/// How baseline tests are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselinePolicy {
    /// Baseline candidates win every iteration in which any of them helps.
    #[default]
    Prefer,
    /// Every baseline test with coverage is kept up front, then gaps are filled.
    AlwaysKeep,
}

/// Selector tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorOptions {
    /// Required coverage percentage, inclusive.
    pub threshold: f64,
    pub policy: BaselinePolicy,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            policy: BaselinePolicy::default(),
        }
    }
}

/// A test that ran successfully, with its coverage.
#[derive(Debug, Clone)]
pub struct Candidate<A> {
    pub test: TestId,
    pub baseline: bool,
    pub coverage: A,
}

impl<A> Candidate<A> {
    /// Create a candidate.
    pub fn new(test: TestId, baseline: bool, coverage: A) -> Self {
        Self {
            test,
            baseline,
            coverage,
        }
    }
}

/// A selected test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeptTest {
    pub test: TestId,
    pub baseline: bool,
    /// Gaps whose percentage rose when the test was committed.
    pub improved: usize,
    /// Gaps that reached the threshold when the test was committed.
    pub filled: usize,
}

/// A candidate that was not selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundantTest {
    pub test: TestId,
    pub baseline: bool,
}

/// Outcome of a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Kept tests in the order they were chosen.
    pub kept: Vec<KeptTest>,
    /// Candidates that were not chosen, in discovery order.
    pub redundant: Vec<RedundantTest>,
    /// Targets still below threshold when no candidate could improve them.
    pub unreachable: Vec<String>,
}

/// Select a minimal ordered set of candidates reaching `threshold` on every target.
///
/// `candidates` must be in discovery order (baseline first, then the rest).
/// Cancellation is checked between iterations; a cancelled selection
/// yields no result.
pub fn select<A: CoverageAggregate>(
    candidates: &[Candidate<A>],
    targets: &BTreeSet<String>,
    options: &SelectorOptions,
    cancel: &CancellationToken,
) -> Result<Selection> {
    let mut state = SelectionState::new(candidates.len(), targets, options.threshold);

    if options.policy == BaselinePolicy::AlwaysKeep {
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.baseline {
                cancel.check()?;
                let improved = state.improvements(&candidate.coverage);
                state.commit(index, candidate, improved);
            }
        }
    }

    while !state.gaps.is_empty() {
        cancel.check()?;

        let best = state
            .best(candidates, true)
            .or_else(|| state.best(candidates, false));
        let Some((improved, index)) = best else {
            break;
        };
        state.commit(index, &candidates[index], improved);
    }

    let unreachable: Vec<String> = state.gaps.iter().cloned().collect();
    for function in &unreachable {
        tracing::warn!(
            "Target {function} cannot reach {:.1}% with the selected tests",
            options.threshold
        );
    }

    let redundant = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| !state.kept_flags[*i])
        .map(|(_, c)| RedundantTest {
            test: c.test.clone(),
            baseline: c.baseline,
        })
        .collect();

    Ok(Selection {
        kept: state.kept,
        redundant,
        unreachable,
    })
}

/// Running state. Kept tests only grow, gaps only shrink.
struct SelectionState<A> {
    running: A,
    gaps: BTreeSet<String>,
    kept: Vec<KeptTest>,
    kept_flags: Vec<bool>,
    threshold: f64,
}

impl<A: CoverageAggregate> SelectionState<A> {
    fn new(count: usize, targets: &BTreeSet<String>, threshold: f64) -> Self {
        let running = A::empty();
        let gaps = targets
            .iter()
            .filter(|f| is_gap(&running, f, threshold))
            .cloned()
            .collect();
        Self {
            running,
            gaps,
            kept: Vec::new(),
            kept_flags: vec![false; count],
            threshold,
        }
    }

    /// Gaps whose percentage would strictly rise if `coverage` were merged.
    /// A function without data counts as 0%.
    fn improvements(&self, coverage: &A) -> usize {
        self.gaps
            .iter()
            .filter(|function| {
                let before = self.running.percent(function).unwrap_or(0.0);
                self.running
                    .union_percent(coverage, function)
                    .is_some_and(|after| after > before)
            })
            .count()
    }

    /// Best not-yet-kept candidate of the given kind as `(improvement, index)`.
    fn best(&self, candidates: &[Candidate<A>], baseline: bool) -> Option<(usize, usize)> {
        candidates
            .par_iter()
            .enumerate()
            .filter(|(i, c)| !self.kept_flags[*i] && c.baseline == baseline)
            .map(|(i, c)| (self.improvements(&c.coverage), i))
            .filter(|(improved, _)| *improved > 0)
            .reduce_with(|a, b| {
                if b.0 > a.0 || (b.0 == a.0 && b.1 < a.1) {
                    b
                } else {
                    a
                }
            })
    }

    fn commit(&mut self, index: usize, candidate: &Candidate<A>, improved: usize) {
        self.running.merge_from(&candidate.coverage);
        self.kept_flags[index] = true;

        let before = self.gaps.len();
        let (running, threshold) = (&self.running, self.threshold);
        self.gaps.retain(|f| is_gap(running, f, threshold));
        let filled = before - self.gaps.len();

        tracing::debug!(
            "KEEP {}{} (improved {improved}, filled {filled}, {} gaps left)",
            candidate.test,
            if candidate.baseline { " (baseline)" } else { "" },
            self.gaps.len()
        );
        self.kept.push(KeptTest {
            test: candidate.test.clone(),
            baseline: candidate.baseline,
            improved,
            filled,
        });
    }
}

fn is_gap<A: CoverageAggregate>(running: &A, function: &str, threshold: f64) -> bool {
    running.percent(function).unwrap_or(0.0) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::aggregate::FunctionPercentages;

    fn cov(entries: &[(&str, f64)]) -> FunctionPercentages {
        entries.iter().map(|(f, p)| (f.to_string(), *p)).collect()
    }

    fn candidate(name: &str, baseline: bool, entries: &[(&str, f64)]) -> Candidate<FunctionPercentages> {
        Candidate::new(TestId::new("p", name), baseline, cov(entries))
    }

    fn targets(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn run(
        candidates: &[Candidate<FunctionPercentages>],
        targets: &BTreeSet<String>,
        policy: BaselinePolicy,
    ) -> Selection {
        let options = SelectorOptions {
            threshold: 80.0,
            policy,
        };
        select(candidates, targets, &options, &CancellationToken::new()).unwrap()
    }

    fn kept_names(selection: &Selection) -> Vec<&str> {
        selection.kept.iter().map(|k| k.test.name.as_str()).collect()
    }

    fn redundant_names(selection: &Selection) -> Vec<&str> {
        selection.redundant.iter().map(|c| c.test.name.as_str()).collect()
    }

    #[test]
    fn test_identical_coverage_keeps_first_discovered() {
        let candidates = vec![
            candidate("TestA", false, &[("f1", 100.0)]),
            candidate("TestB", false, &[("f1", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestA"]);
        assert_eq!(redundant_names(&selection), vec!["TestB"]);
    }

    #[test]
    fn test_superset_wins() {
        let candidates = vec![
            candidate("TestSmall", false, &[("f1", 100.0)]),
            candidate("TestBig", false, &[("f1", 100.0), ("f2", 100.0), ("f3", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2", "f3"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestBig"]);
        assert_eq!(redundant_names(&selection), vec!["TestSmall"]);
        assert_eq!(selection.kept[0].filled, 3);
    }

    #[test]
    fn test_partial_coverage_does_not_fill_gap() {
        let candidates = vec![
            candidate("TestPartial", false, &[("f1", 50.0)]),
            candidate("TestFull", false, &[("f1", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1"]), BaselinePolicy::Prefer);
        assert!(kept_names(&selection).contains(&"TestFull"));
        let partial = selection.kept.iter().find(|k| k.test.name == "TestPartial");
        assert!(partial.is_none_or(|k| k.filled == 0));
        assert!(selection.unreachable.is_empty());
    }

    #[test]
    fn test_unique_contributions_are_kept() {
        let candidates = vec![
            candidate("TestOne", false, &[("f1", 100.0)]),
            candidate("TestTwo", false, &[("f2", 90.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestOne", "TestTwo"]);
        assert!(selection.redundant.is_empty());
    }

    #[test]
    fn test_baseline_preferred_over_better_non_baseline() {
        let candidates = vec![
            candidate("TestBase", true, &[("f1", 100.0)]),
            candidate("TestUnit", false, &[("f1", 100.0), ("f2", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestBase", "TestUnit"]);
        assert!(selection.kept[0].baseline);
        assert!(!selection.kept[1].baseline);
    }

    #[test]
    fn test_redundant_baseline_is_reported() {
        let candidates = vec![
            candidate("TestBaseWide", true, &[("f1", 100.0), ("f2", 100.0)]),
            candidate("TestBaseNarrow", true, &[("f1", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestBaseWide"]);
        assert_eq!(redundant_names(&selection), vec!["TestBaseNarrow"]);
        assert!(selection.redundant[0].baseline);
    }

    #[test]
    fn test_always_keep_retains_every_baseline() {
        let candidates = vec![
            candidate("TestBaseWide", true, &[("f1", 100.0), ("f2", 100.0)]),
            candidate("TestBaseNarrow", true, &[("f1", 100.0)]),
            candidate("TestUnit", false, &[("f1", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2"]), BaselinePolicy::AlwaysKeep);
        assert_eq!(kept_names(&selection), vec!["TestBaseWide", "TestBaseNarrow"]);
        assert_eq!(selection.kept[1].improved, 0);
        assert_eq!(redundant_names(&selection), vec!["TestUnit"]);
    }

    #[test]
    fn test_threshold_boundary() {
        let exact = vec![candidate("TestExact", false, &[("f1", 80.0)])];
        let selection = run(&exact, &targets(&["f1"]), BaselinePolicy::Prefer);
        assert!(selection.unreachable.is_empty());
        assert_eq!(selection.kept[0].filled, 1);

        let below = vec![candidate("TestBelow", false, &[("f1", 80.0 - 1e-9)])];
        let selection = run(&below, &targets(&["f1"]), BaselinePolicy::Prefer);
        assert_eq!(selection.unreachable, vec!["f1".to_string()]);
        assert_eq!(selection.kept[0].filled, 0);
    }

    #[test]
    fn test_empty_input() {
        let selection = run(&[], &BTreeSet::new(), BaselinePolicy::Prefer);
        assert!(selection.kept.is_empty());
        assert!(selection.redundant.is_empty());
        assert!(selection.unreachable.is_empty());
    }

    #[test]
    fn test_no_targets_makes_everything_redundant() {
        let candidates = vec![candidate("TestA", true, &[("f1", 10.0)])];
        let selection = run(&candidates, &BTreeSet::new(), BaselinePolicy::Prefer);
        assert!(selection.kept.is_empty());
        assert_eq!(redundant_names(&selection), vec!["TestA"]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let candidates: Vec<_> = (0..40)
            .map(|i| {
                let f = format!("f{}", i % 7);
                candidate(&format!("Test{i:02}"), i % 5 == 0, &[(f.as_str(), 100.0)])
            })
            .collect();
        let all: BTreeSet<String> = (0..7).map(|i| format!("f{i}")).collect();
        let first = run(&candidates, &all, BaselinePolicy::Prefer);
        for _ in 0..5 {
            assert_eq!(run(&candidates, &all, BaselinePolicy::Prefer), first);
        }
    }

    #[test]
    fn test_zero_percent_baseline_is_not_kept() {
        let candidates = vec![
            candidate("TestBaseNothing", true, &[("f1", 0.0)]),
            candidate("TestReal", false, &[("f1", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestReal"]);
        assert_eq!(redundant_names(&selection), vec!["TestBaseNothing"]);
        assert!(selection.redundant[0].baseline);
    }

    #[test]
    fn test_dense_percentages_pick_superset() {
        let candidates = vec![
            candidate("TestSmall", false, &[("f1", 100.0), ("f2", 0.0), ("f3", 0.0)]),
            candidate("TestBig", false, &[("f1", 100.0), ("f2", 100.0), ("f3", 100.0)]),
        ];
        let selection = run(&candidates, &targets(&["f1", "f2", "f3"]), BaselinePolicy::Prefer);
        assert_eq!(kept_names(&selection), vec!["TestBig"]);
        assert_eq!(selection.kept[0].improved, 3);
    }

    #[test]
    fn test_dense_block_profiles_pick_superset() {
        use crate::coverage::{BlockSet, FunctionBounds, FunctionMap, ProfileFilter};
        use crate::selector::aggregate::FunctionBlocks;

        let mut map = FunctionMap::new();
        map.insert(
            "m/a.go",
            vec![
                FunctionBounds::new("F1", 1, 5),
                FunctionBounds::new("F2", 6, 10),
                FunctionBounds::new("F3", 11, 15),
            ],
        );
        let profile = |f1: u8, f2: u8, f3: u8| {
            let text = format!(
                "mode: set\nm/a.go:2.1,3.1 1 {f1}\nm/a.go:7.1,8.1 1 {f2}\nm/a.go:12.1,13.1 1 {f3}\n"
            );
            let set = BlockSet::load_from_record(&text, &ProfileFilter::default()).unwrap();
            FunctionBlocks::from_block_set(&set, &map)
        };
        let candidates = vec![
            Candidate::new(TestId::new("p", "TestSmall"), false, profile(1, 0, 0)),
            Candidate::new(TestId::new("p", "TestBig"), false, profile(1, 1, 1)),
        ];
        let all = targets(&["m/a.go:F1", "m/a.go:F2", "m/a.go:F3"]);

        let selection = select(&candidates, &all, &SelectorOptions::default(), &CancellationToken::new()).unwrap();
        let kept: Vec<_> = selection.kept.iter().map(|k| k.test.name.as_str()).collect();
        assert_eq!(kept, vec!["TestBig"]);
        assert_eq!(selection.kept[0].filled, 3);
        assert!(selection.unreachable.is_empty());
    }

    #[test]
    fn test_zero_threshold_needs_no_tests() {
        let candidates = vec![candidate("TestA", true, &[("f1", 0.0)])];
        let options = SelectorOptions {
            threshold: 0.0,
            policy: BaselinePolicy::Prefer,
        };
        let selection = select(&candidates, &targets(&["f1"]), &options, &CancellationToken::new()).unwrap();
        assert!(selection.kept.is_empty());
        assert!(selection.unreachable.is_empty());
    }

    #[test]
    fn test_cancelled_selection_returns_error() {
        let candidates = vec![candidate("TestA", false, &[("f1", 100.0)])];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = select(&candidates, &targets(&["f1"]), &SelectorOptions::default(), &cancel);
        assert!(matches!(result, Err(crate::core::Error::Cancelled)));
    }
}
