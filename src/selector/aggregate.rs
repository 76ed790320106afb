//! Function-level coverage aggregates consumed by the selector.

use std::collections::{BTreeMap, BTreeSet};

use crate::coverage::{BlockSet, FunctionLocator};

/// Coverage of one or more tests, reduced to functions.
///
/// `merge_from` must be commutative, associative and idempotent, and
/// `union_percent(other, f)` must equal `percent(f)` after merging `other`.
pub trait CoverageAggregate: Clone + Send + Sync {
    /// An aggregate with no coverage.
    fn empty() -> Self;

    /// Merge another aggregate into this one.
    fn merge_from(&mut self, other: &Self);

    /// Coverage percentage of `function`, or `None` when it has no statements.
    fn percent(&self, function: &str) -> Option<f64>;

    /// Percentage of `function` after merging `other`, without mutating.
    fn union_percent(&self, other: &Self, function: &str) -> Option<f64>;

    /// Functions with a defined percentage.
    fn functions(&self) -> Vec<String>;
}

/// Functions whose full-suite coverage reaches `threshold` (inclusive).
pub fn select_targets<A: CoverageAggregate>(full: &A, threshold: f64) -> BTreeSet<String> {
    full.functions()
        .into_iter()
        .filter(|f| full.percent(f).is_some_and(|p| p >= threshold))
        .collect()
}

/// Pre-reduced per-function percentages, as reported by a cover tool.
///
/// Percentages are not additive, so the union of two aggregates keeps the
/// per-function maximum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionPercentages {
    percents: BTreeMap<String, f64>,
}

impl FunctionPercentages {
    /// Wrap a `function -> percent` map.
    pub fn new(percents: BTreeMap<String, f64>) -> Self {
        Self { percents }
    }

    /// The underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.percents
    }
}

impl FromIterator<(String, f64)> for FunctionPercentages {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl CoverageAggregate for FunctionPercentages {
    fn empty() -> Self {
        Self::default()
    }

    fn merge_from(&mut self, other: &Self) {
        for (function, percent) in &other.percents {
            self.percents
                .entry(function.clone())
                .and_modify(|p| *p = p.max(*percent))
                .or_insert(*percent);
        }
    }

    fn percent(&self, function: &str) -> Option<f64> {
        self.percents.get(function).copied()
    }

    fn union_percent(&self, other: &Self, function: &str) -> Option<f64> {
        match (self.percent(function), other.percent(function)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn functions(&self) -> Vec<String> {
        self.percents.keys().cloned().collect()
    }
}

/// Blocks grouped by enclosing function, so unions are exact statement unions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionBlocks {
    functions: BTreeMap<String, BlockSet>,
}

impl FunctionBlocks {
    /// Partition a block set by function. Blocks outside functions are dropped.
    pub fn from_block_set<L: FunctionLocator + ?Sized>(blocks: &BlockSet, locator: &L) -> Self {
        Self {
            functions: blocks.partition_by_function(locator),
        }
    }

    /// Blocks attributed to `function`.
    pub fn blocks(&self, function: &str) -> Option<&BlockSet> {
        self.functions.get(function)
    }
}

impl CoverageAggregate for FunctionBlocks {
    fn empty() -> Self {
        Self::default()
    }

    fn merge_from(&mut self, other: &Self) {
        for (function, blocks) in &other.functions {
            self.functions
                .entry(function.clone())
                .or_default()
                .merge(blocks);
        }
    }

    fn percent(&self, function: &str) -> Option<f64> {
        self.functions.get(function)?.percent()
    }

    fn union_percent(&self, other: &Self, function: &str) -> Option<f64> {
        match (self.functions.get(function), other.functions.get(function)) {
            (Some(own), Some(theirs)) => own.union_stats(theirs).percent(),
            (Some(only), None) | (None, Some(only)) => only.percent(),
            (None, None) => None,
        }
    }

    fn functions(&self) -> Vec<String> {
        self.functions
            .iter()
            .filter(|(_, blocks)| blocks.total_statements() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }
}
