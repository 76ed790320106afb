//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::coverage::{ProfileFilter, DEFAULT_EXCLUDED_SUFFIXES};
use crate::discovery::BaselineSpec;
use crate::pipeline::FunctionSource;
use crate::selector::BaselinePolicy;

const ENV_PREFIX: &str = "TESTREDUNDANCY_";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tests that are preferred (or always kept) during selection.
    pub baseline_tests: Vec<BaselineSpec>,
    /// Required per-function coverage percentage (0-100).
    pub coverage_threshold: f64,
    /// Package pattern whose tests are analyzed.
    pub package_to_analyze: String,
    /// `-coverpkg` value. Empty means `./...`.
    pub coverage_packages: String,
    /// Parallel workers (0 = available parallelism).
    pub jobs: usize,
    /// Per-test timeout in seconds.
    pub timeout_secs: u64,
    /// File suffixes dropped from coverage profiles.
    pub exclude_suffixes: Vec<String>,
    pub baseline_policy: BaselinePolicy,
    pub function_source: FunctionSource,
    /// The `go` executable.
    pub go_binary: String,
    /// Where per-test coverage artifacts go. Defaults to a temp subdirectory.
    pub artifact_dir: Option<PathBuf>,
    /// Leave per-test artifacts on disk.
    pub keep_artifacts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baseline_tests: Vec::new(),
            coverage_threshold: 80.0,
            package_to_analyze: "./...".to_string(),
            coverage_packages: "./...".to_string(),
            jobs: 0,
            timeout_secs: 600,
            exclude_suffixes: DEFAULT_EXCLUDED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            baseline_policy: BaselinePolicy::Prefer,
            function_source: FunctionSource::Ast,
            go_binary: "go".to_string(),
            artifact_dir: None,
            keep_artifacts: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Env vars with the
    /// `TESTREDUNDANCY_` prefix override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::from(Serialized::defaults(Self::default())).merge(Toml::file_exact(path)),
        )
    }

    /// Load configuration from a project directory, looking for
    /// `testredundancy.toml` or `.testredundancy/config.toml`.
    ///
    /// Missing files are skipped and defaults are used.
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::extract(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(dir.join("testredundancy.toml")))
                .merge(Toml::file(dir.join(".testredundancy/config.toml"))),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.coverage_threshold) {
            return Err(Error::config(format!(
                "coverage_threshold must be between 0 and 100, got {}",
                self.coverage_threshold
            )));
        }
        if self.package_to_analyze.trim().is_empty() {
            return Err(Error::config("package_to_analyze must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be positive"));
        }
        if let Some(spec) = self
            .baseline_tests
            .iter()
            .find(|s| s.package.trim().is_empty())
        {
            return Err(Error::config(format!("baseline entry without package: {spec:?}")));
        }
        Ok(())
    }

    /// The `-coverpkg` value, defaulting to `./...`.
    pub fn coverpkg(&self) -> &str {
        match self.coverage_packages.trim() {
            "" => "./...",
            pkgs => pkgs,
        }
    }

    /// The profile exclusion filter.
    pub fn filter(&self) -> ProfileFilter {
        ProfileFilter::new(self.exclude_suffixes.iter().cloned())
    }

    /// Per-test timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Artifact directory, defaulting to `<tmp>/testredundancy`.
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifact_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("testredundancy"))
    }

    /// Create default config file content.
    pub fn default_toml() -> &'static str {
        include_str!("default_config.toml")
    }
}
