//! Go toolchain collaborators.
//!
//! [`GoToolchain`] shells out to the `go` command for package listing, test
//! listing, per-test coverage runs and per-function reports, and uses the
//! tree-sitter parser to find parallel-safe tests.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::core::{CancellationToken, Error, Result, TestId};
use crate::discovery::{parse_test_list, ParallelClassifier, TestLister};
use crate::parser::GoParser;
use crate::runner::TestRunner;

/// Produces per-function reports (`<file>:<line>:\t<func>\t<pct>%`) for a
/// profile on disk.
pub trait CoverTool: Send + Sync {
    fn function_report(&self, profile: &Path) -> impl Future<Output = Result<String>> + Send;
}

/// Settings for invoking the Go toolchain.
#[derive(Debug, Clone)]
pub struct GoConfig {
    /// The `go` executable.
    pub go_binary: String,
    /// Directory commands run in.
    pub project_dir: PathBuf,
    /// `-coverpkg` value.
    pub coverpkg: String,
    /// Per-test run timeout.
    pub timeout: Duration,
    /// Leave coverage artifacts on disk after reading them.
    pub keep_artifacts: bool,
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            go_binary: "go".to_string(),
            project_dir: PathBuf::from("."),
            coverpkg: "./...".to_string(),
            timeout: Duration::from_secs(600),
            keep_artifacts: false,
        }
    }
}

/// The `go` command as a test lister, classifier, runner and cover tool.
pub struct GoToolchain {
    config: GoConfig,
    parser: Arc<GoParser>,
}

impl GoToolchain {
    /// Create a toolchain wrapper.
    pub fn new(config: GoConfig) -> Result<Self> {
        Ok(Self {
            config,
            parser: Arc::new(GoParser::new()?),
        })
    }

    /// Get the toolchain configuration.
    pub fn config(&self) -> &GoConfig {
        &self.config
    }

    /// Nearest ancestor of the project dir (inclusive) containing `go.mod`.
    pub fn module_root(&self) -> Result<PathBuf> {
        let start = self
            .config
            .project_dir
            .canonicalize()
            .unwrap_or_else(|_| self.config.project_dir.clone());
        start
            .ancestors()
            .find(|dir| dir.join("go.mod").is_file())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                Error::config(format!("no go.mod found above {}", start.display()))
            })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.go_binary);
        cmd.current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run `go <args>` and return stdout, failing on a non-zero exit.
    async fn output(&self, args: &[&str]) -> Result<String> {
        let rendered = format!("{} {}", self.config.go_binary, args.join(" "));
        tracing::debug!("Running {rendered}");

        let output = self
            .command()
            .args(args)
            .output()
            .await
            .map_err(|e| Error::stage(rendered.clone(), e.to_string()))?;

        if !output.status.success() {
            return Err(Error::stage(
                rendered,
                format!("{}: {}", output.status, last_line(&output.stderr)),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn package_dir(&self, package: &str) -> Result<PathBuf> {
        let dir = self.output(&["list", "-f", "{{.Dir}}", package]).await?;
        Ok(PathBuf::from(dir.trim()))
    }

    async fn parallel_tests_in_dir(&self, dir: &Path) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_test_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_test.go"));
            if !is_test_file {
                continue;
            }
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::debug!("Skipping {}: {e}", path.display());
                    continue;
                }
            };
            match self.parser.parse(&content, &path) {
                Ok(parsed) => found.extend(parsed.parallel_tests()),
                Err(e) => tracing::debug!("Skipping {}: {e}", path.display()),
            }
        }
        Ok(found)
    }
}

impl TestLister for GoToolchain {
    async fn list_tests(&self, pattern: &str) -> Result<Vec<TestId>> {
        let packages = self.output(&["list", pattern]).await?;

        let mut tests = Vec::new();
        for package in packages.lines().map(str::trim).filter(|p| !p.is_empty()) {
            match self.output(&["test", "-list", ".", package]).await {
                Ok(listing) => tests.extend(parse_test_list(package, &listing)),
                Err(e) => tracing::warn!("Skipping package {package}: {e}"),
            }
        }
        Ok(tests)
    }

    async fn resolve_package(&self, package: &str) -> Result<String> {
        let resolved = self.output(&["list", package]).await?;
        let mut lines = resolved.lines().map(str::trim).filter(|l| !l.is_empty());
        match (lines.next(), lines.next()) {
            (Some(single), None) => Ok(single.to_string()),
            (None, _) => Err(Error::stage(
                "Resolving package",
                format!("{package} matched no packages"),
            )),
            (Some(_), Some(_)) => Err(Error::stage(
                "Resolving package",
                format!("{package} matched more than one package"),
            )),
        }
    }
}

impl ParallelClassifier for GoToolchain {
    async fn classify(&self, tests: &[TestId]) -> Result<HashSet<TestId>> {
        let mut by_package: BTreeMap<&str, Vec<&TestId>> = BTreeMap::new();
        for test in tests {
            by_package.entry(test.package.as_str()).or_default().push(test);
        }

        let mut parallel = HashSet::new();
        for (package, package_tests) in by_package {
            let dir = match self.package_dir(package).await {
                Ok(dir) => dir,
                Err(e) => {
                    tracing::warn!("Treating tests in {package} as serial: {e}");
                    continue;
                }
            };
            let names = match self.parallel_tests_in_dir(&dir).await {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!("Treating tests in {package} as serial: {e}");
                    continue;
                }
            };
            parallel.extend(
                package_tests
                    .into_iter()
                    .filter(|t| names.contains(&t.name))
                    .cloned(),
            );
        }
        Ok(parallel)
    }
}

impl TestRunner for GoToolchain {
    async fn run_for_coverage(
        &self,
        test: &TestId,
        artifact: &Path,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let qualified = test.qualified_name();
        let child = self
            .command()
            .arg("test")
            .arg("-count=1")
            .arg(format!("-coverprofile={}", artifact.display()))
            .arg(format!("-coverpkg={}", self.config.coverpkg))
            .arg("-run")
            .arg(format!("^{}$", test.name))
            .arg(&test.package)
            .spawn()
            .map_err(|e| Error::test_run(&qualified, format!("failed to start go: {e}")))?;

        // Dropping the child on cancel or timeout kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            waited = tokio::time::timeout(self.config.timeout, child.wait_with_output()) => match waited {
                Err(_) => {
                    remove_artifact(artifact).await;
                    return Err(Error::test_run(
                        &qualified,
                        format!("timed out after {}s", self.config.timeout.as_secs()),
                    ));
                }
                Ok(Err(e)) => return Err(Error::test_run(&qualified, e.to_string())),
                Ok(Ok(output)) => output,
            },
        };

        if !output.status.success() {
            remove_artifact(artifact).await;
            let detail = match last_line(&output.stdout) {
                line if line.is_empty() => last_line(&output.stderr),
                line => line,
            };
            return Err(Error::test_run(
                &qualified,
                format!("{}: {detail}", output.status),
            ));
        }

        let text = tokio::fs::read_to_string(artifact).await.map_err(|e| {
            Error::test_run(
                &qualified,
                format!("unreadable coverage artifact {}: {e}", artifact.display()),
            )
        })?;
        if !self.config.keep_artifacts {
            remove_artifact(artifact).await;
        }
        Ok(text)
    }
}

impl CoverTool for GoToolchain {
    async fn function_report(&self, profile: &Path) -> Result<String> {
        let func_arg = format!("-func={}", profile.display());
        self.output(&["tool", "cover", &func_arg]).await
    }
}

async fn remove_artifact(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!("Failed to remove {}: {e}", path.display());
        }
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
