//! End-to-end `find`: discover, run, aggregate, select, validate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::{CancellationToken, Error, Result, TestId};
use crate::coverage::{parse_function_report, BlockSet, FunctionMap};
use crate::discovery::{BaselineSet, BaselineSpec, ParallelClassifier, TestLister};
use crate::golang::{CoverTool, GoConfig, GoToolchain};
use crate::report::{Report, RunSummary};
use crate::runner::{artifact_name, Orchestrator, OrchestratorConfig, RunOutcome, TestRunner};
use crate::selector::{
    select, select_targets, validate, Candidate, CoverageAggregate, FunctionBlocks,
    FunctionPercentages, SelectorOptions,
};

/// Where per-function coverage comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionSource {
    /// Blocks attributed to functions found by parsing the module's sources.
    #[default]
    Ast,
    /// Percentages reported by `go tool cover -func`.
    CoverTool,
}

/// Everything a `find` run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Package pattern whose tests are candidates.
    pub package: String,
    pub baselines: Vec<BaselineSpec>,
    pub selector: SelectorOptions,
    pub function_source: FunctionSource,
    pub orchestrator: OrchestratorConfig,
    /// Leave the artifact directory in place after the run.
    pub keep_artifacts: bool,
}

impl FindOptions {
    /// Build options from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            package: config.package_to_analyze.clone(),
            baselines: config.baseline_tests.clone(),
            selector: SelectorOptions {
                threshold: config.coverage_threshold,
                policy: config.baseline_policy,
            },
            function_source: config.function_source,
            orchestrator: OrchestratorConfig::default()
                .jobs(config.jobs)
                .artifact_dir(config.artifact_dir())
                .filter(config.filter()),
            keep_artifacts: config.keep_artifacts,
        }
    }
}

/// Drives one `find` run against a toolchain.
pub struct Finder<T> {
    toolchain: Arc<T>,
    options: FindOptions,
    module_root: PathBuf,
    function_map: Option<FunctionMap>,
}

impl<T> Finder<T>
where
    T: TestLister + ParallelClassifier + TestRunner + CoverTool,
{
    /// Create a finder. `module_root` is where the function map is built from.
    pub fn new(toolchain: Arc<T>, options: FindOptions, module_root: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            options,
            module_root: module_root.into(),
            function_map: None,
        }
    }

    /// Use a prebuilt function map instead of parsing the module.
    pub fn with_function_map(mut self, map: FunctionMap) -> Self {
        self.function_map = Some(map);
        self
    }

    /// Get the run options.
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Run the whole pipeline.
    ///
    /// Per-test failures end up in the report. Listing failures, a run in
    /// which no test produced coverage, and cancellation are fatal. The
    /// artifact directory is removed afterwards unless `keep_artifacts` is
    /// set; a directory that still holds files is left alone.
    pub async fn find(&self, cancel: &CancellationToken) -> Result<Report> {
        let result = self.run(cancel).await;
        if !self.options.keep_artifacts {
            let dir = &self.options.orchestrator.artifact_dir;
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                tracing::debug!("Left artifact directory {}: {e}", dir.display());
            }
        }
        result
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<Report> {
        let options = &self.options;
        let mut report = Report::new(
            &options.package,
            options.selector.threshold,
            options.selector.policy,
        );

        let baselines = BaselineSet::resolve(&options.baselines, self.toolchain.as_ref()).await?;
        if !baselines.is_empty() {
            tracing::info!(
                "Baseline: {} exact tests, {} patterns",
                baselines.exact_count(),
                baselines.pattern_count()
            );
        }

        tracing::info!("Listing tests in {}", options.package);
        let discovered = self
            .toolchain
            .list_tests(&options.package)
            .await
            .map_err(|e| Error::stage("Listing tests", e.to_string()))?;
        cancel.check()?;

        let tests = dedupe(discovered);
        let (baseline_tests, other_tests) = baselines.partition(tests);
        tracing::info!(
            "Found {} tests ({} baseline, {} non-baseline)",
            baseline_tests.len() + other_tests.len(),
            baseline_tests.len(),
            other_tests.len()
        );
        report.summary.discovered = baseline_tests.len() + other_tests.len();
        report.summary.baseline = baseline_tests.len();
        report.summary.non_baseline = other_tests.len();

        if report.summary.discovered == 0 {
            tracing::warn!("No tests found in {}", options.package);
            return Ok(report);
        }

        let ordered: Vec<TestId> = baseline_tests.into_iter().chain(other_tests).collect();
        let parallel_safe = match self.toolchain.classify(&ordered).await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!("Parallel-safety detection failed, running all tests serially: {e}");
                HashSet::new()
            }
        };
        report.summary.parallel_safe = parallel_safe.len();
        cancel.check()?;

        tokio::fs::create_dir_all(&options.orchestrator.artifact_dir).await?;
        let orchestrator =
            Orchestrator::new(Arc::clone(&self.toolchain), options.orchestrator.clone());
        let outcome = orchestrator.run(&ordered, &parallel_safe, cancel).await?;

        report.summary.succeeded = outcome.succeeded();
        report.summary.failed = outcome.failures.len();
        if outcome.succeeded() == 0 {
            return Err(Error::NoUsableCoverage);
        }
        report.run_failures = outcome.failures.clone();

        match options.function_source {
            FunctionSource::Ast => {
                let candidates = self.block_candidates(&outcome, &baselines).await?;
                self.select_into(report, &candidates, cancel)
            }
            FunctionSource::CoverTool => {
                let candidates = self.percentage_candidates(&outcome, &baselines, cancel).await?;
                self.select_into(report, &candidates, cancel)
            }
        }
    }

    fn select_into<A: CoverageAggregate>(
        &self,
        mut report: Report,
        candidates: &[Candidate<A>],
        cancel: &CancellationToken,
    ) -> Result<Report> {
        let threshold = self.options.selector.threshold;

        let mut full = A::empty();
        for candidate in candidates {
            full.merge_from(&candidate.coverage);
        }
        let targets = select_targets(&full, threshold);
        report.summary.targets = targets.len();
        tracing::info!("{} functions reach {threshold:.1}% with all tests", targets.len());

        let selection = select(candidates, &targets, &self.options.selector, cancel)?;
        let shortfalls = validate(
            candidates,
            &selection.kept,
            &targets,
            &selection.unreachable,
            threshold,
        );
        for shortfall in &shortfalls {
            tracing::warn!(
                "Validation: {} at {:.1}% ({:.1} points below threshold)",
                shortfall.function,
                shortfall.percent,
                shortfall.missing
            );
        }
        tracing::info!(
            "Keeping {} of {} tests",
            selection.kept.len(),
            candidates.len()
        );

        Ok(report.with_selection(selection, shortfalls))
    }

    async fn block_candidates(
        &self,
        outcome: &RunOutcome,
        baselines: &BaselineSet,
    ) -> Result<Vec<Candidate<FunctionBlocks>>> {
        let built;
        let map = match &self.function_map {
            Some(map) => map,
            None => {
                let root = self.module_root.clone();
                built = tokio::task::spawn_blocking(move || FunctionMap::build(&root))
                    .await
                    .map_err(|e| Error::stage("Building function map", e.to_string()))?
                    .map_err(|e| Error::stage("Building function map", e.to_string()))?;
                tracing::info!("Mapped functions in {} files", built.len());
                &built
            }
        };

        Ok(candidates_from(outcome, baselines, |coverage| {
            FunctionBlocks::from_block_set(coverage, map)
        }))
    }

    async fn percentage_candidates(
        &self,
        outcome: &RunOutcome,
        baselines: &BaselineSet,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate<FunctionPercentages>>> {
        let dir = &self.options.orchestrator.artifact_dir;
        let mut candidates = Vec::with_capacity(outcome.order.len());
        for test in &outcome.order {
            cancel.check()?;
            let Some(coverage) = outcome.coverage.get(test) else {
                continue;
            };
            let path = dir.join(format!("func_{}", artifact_name(test)));
            let percents = self.function_percentages(coverage, &path).await;
            remove_quietly(&path).await;
            candidates.push(Candidate::new(
                test.clone(),
                baselines.contains(test),
                percents?,
            ));
        }
        Ok(candidates)
    }

    async fn function_percentages(
        &self,
        coverage: &BlockSet,
        path: &Path,
    ) -> Result<FunctionPercentages> {
        tokio::fs::write(path, coverage.to_profile("set").render()).await?;
        let text = self.toolchain.function_report(path).await?;
        Ok(FunctionPercentages::new(parse_function_report(&text)))
    }
}

fn candidates_from<A>(
    outcome: &RunOutcome,
    baselines: &BaselineSet,
    mut aggregate: impl FnMut(&BlockSet) -> A,
) -> Vec<Candidate<A>> {
    outcome
        .order
        .iter()
        .filter_map(|test| {
            let coverage = outcome.coverage.get(test)?;
            Some(Candidate::new(
                test.clone(),
                baselines.contains(test),
                aggregate(coverage),
            ))
        })
        .collect()
}

fn dedupe(tests: Vec<TestId>) -> Vec<TestId> {
    let mut seen = HashSet::new();
    tests.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("Failed to remove {}: {e}", path.display());
    }
}

/// Run `find` against the real Go toolchain rooted at `root`.
pub async fn find_go(config: &Config, root: &Path, cancel: &CancellationToken) -> Result<Report> {
    let toolchain = GoToolchain::new(GoConfig {
        go_binary: config.go_binary.clone(),
        project_dir: root.to_path_buf(),
        coverpkg: config.coverpkg().to_string(),
        timeout: config.timeout(),
        keep_artifacts: config.keep_artifacts,
    })?;
    let module_root = toolchain.module_root()?;

    Finder::new(Arc::new(toolchain), FindOptions::from_config(config), module_root)
        .find(cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::BaselinePolicy;

    #[test]
    fn test_options_from_config() {
        let config = Config {
            coverage_threshold: 90.0,
            baseline_policy: BaselinePolicy::AlwaysKeep,
            jobs: 3,
            package_to_analyze: "./calc/...".to_string(),
            ..Config::default()
        };
        let options = FindOptions::from_config(&config);
        assert_eq!(options.package, "./calc/...");
        assert_eq!(options.selector.threshold, 90.0);
        assert_eq!(options.selector.policy, BaselinePolicy::AlwaysKeep);
        assert_eq!(options.orchestrator.jobs, 3);
        assert_eq!(options.function_source, FunctionSource::Ast);
        assert!(!options.keep_artifacts);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let tests = vec![
            TestId::new("m/a", "TestA"),
            TestId::new("m/b", "TestB"),
            TestId::new("m/a", "TestA"),
        ];
        assert_eq!(
            dedupe(tests),
            vec![TestId::new("m/a", "TestA"), TestId::new("m/b", "TestB")]
        );
    }

    #[test]
    fn test_function_source_serde() {
        let source: FunctionSource = serde_json::from_str("\"cover-tool\"").unwrap();
        assert_eq!(source, FunctionSource::CoverTool);
    }
}
