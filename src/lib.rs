//! testredundancy - coverage-driven test suite pruning for Go projects.
//!
//! Every test is run once for coverage, coverage is reduced to functions,
//! and a baseline-preferring greedy selector keeps the smallest ordered set
//! of tests that holds every target function at the configured threshold.
//!
//! # Example
//!
//! ```no_run
//! use testredundancy::config::Config;
//! use testredundancy::core::CancellationToken;
//! use testredundancy::pipeline::find_go;
//!
//! # async fn run() -> testredundancy::core::Result<()> {
//! let config = Config::load_default(".")?;
//! let report = find_go(&config, std::path::Path::new("."), &CancellationToken::new()).await?;
//! println!("Keeping {} tests", report.kept.len());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod coverage;
pub mod discovery;
pub mod golang;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod selector;

pub use core::{Error, Result, TestId};
