//! Minimal test-set selection.
//!
//! Targets are the functions the whole suite brings to the threshold. The
//! greedy selector keeps tests until every target is back at threshold, and
//! the validator re-checks the kept set from scratch.

mod aggregate;
mod greedy;
mod validate;

pub use aggregate::{select_targets, CoverageAggregate, FunctionBlocks, FunctionPercentages};
pub use greedy::{
    select, BaselinePolicy, Candidate, KeptTest, RedundantTest, Selection, SelectorOptions,
};
pub use validate::{validate, Shortfall};
