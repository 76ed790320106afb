//! CLI implementation using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::core::Result;
use crate::discovery::BaselineSpec;
use crate::output::Format;
use crate::pipeline::FunctionSource;
use crate::selector::BaselinePolicy;

/// Find redundant Go tests that can be removed without losing per-function coverage.
#[derive(Parser)]
#[command(name = "testredundancy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the Go project
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every test for coverage and report which ones are redundant
    Find(FindArgs),

    /// Merge coverage profiles into one
    Merge(MergeArgs),

    /// Print per-function coverage of a profile
    #[command(alias = "func")]
    Funcs(FuncsArgs),
}

#[derive(Args, Default)]
pub struct FindArgs {
    /// Package pattern whose tests are analyzed
    pub package: Option<String>,

    /// Baseline packages, comma separated (repeatable)
    #[arg(long, value_delimiter = ',')]
    pub baseline: Vec<String>,

    /// Baseline tests by name prefix, as PKG=PREFIX (repeatable)
    #[arg(long = "baseline-pattern", value_name = "PKG=PREFIX")]
    pub baseline_pattern: Vec<String>,

    /// Required per-function coverage percentage
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Packages measured for coverage (-coverpkg)
    #[arg(long)]
    pub coverpkg: Option<String>,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Per-test timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Keep every baseline test, then fill remaining gaps
    #[arg(long)]
    pub always_keep_baseline: bool,

    /// Where per-function coverage comes from
    #[arg(long, value_enum)]
    pub function_source: Option<SourceArg>,

    /// Leave per-test coverage files on disk
    #[arg(long)]
    pub keep_artifacts: bool,
}

impl FindArgs {
    /// Override `config` with the flags that were given.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(package) = &self.package {
            config.package_to_analyze = package.clone();
        }
        config.baseline_tests.extend(
            self.baseline
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(BaselineSpec::package),
        );
        for arg in &self.baseline_pattern {
            config
                .baseline_tests
                .push(BaselineSpec::parse_pattern_arg(arg)?);
        }
        if let Some(threshold) = self.threshold {
            config.coverage_threshold = threshold;
        }
        if let Some(coverpkg) = &self.coverpkg {
            config.coverage_packages = coverpkg.clone();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.always_keep_baseline {
            config.baseline_policy = BaselinePolicy::AlwaysKeep;
        }
        if let Some(source) = self.function_source {
            config.function_source = source.into();
        }
        if self.keep_artifacts {
            config.keep_artifacts = true;
        }
        config.validate()
    }
}

#[derive(Args)]
pub struct MergeArgs {
    /// Coverage profiles to merge
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write the merged profile here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct FuncsArgs {
    /// Coverage profile to report on
    pub profile: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Markdown,
    Text,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Markdown => Format::Markdown,
            OutputFormat::Text => Format::Text,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Ast,
    CoverTool,
}

impl From<SourceArg> for FunctionSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Ast => FunctionSource::Ast,
            SourceArg::CoverTool => FunctionSource::CoverTool,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
