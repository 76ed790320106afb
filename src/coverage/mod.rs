//! Coverage data model.
//!
//! Profiles are parsed into [`CoverageBlock`]s, unioned into [`BlockSet`]s
//! and reduced to per-function percentages through a [`FunctionLocator`].

mod block;
mod block_set;
mod func_report;
mod funcmap;
mod profile;

pub use block::{format_block, parse_block, BlockKey, CoverageBlock};
pub use block_set::{BlockInfo, BlockSet, CoverageStats};
pub use func_report::{parse_function_report, render_function_report};
pub use funcmap::{module_path_from_go_mod, FunctionBounds, FunctionLocator, FunctionMap};
pub use profile::{Profile, ProfileFilter, DEFAULT_EXCLUDED_SUFFIXES};
