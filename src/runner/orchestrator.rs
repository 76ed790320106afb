//! Runs every candidate test once and collects one [`BlockSet`] per test.
//!
//! Serial tests run first, one at a time, in discovery order. Parallel-safe
//! tests then run through a semaphore-bounded pool. Workers never touch the
//! result map: each sends its outcome over a channel and the collector owns
//! all accumulated state.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use super::{artifact_name, TestRunner};
use crate::core::progress::RunProgress;
use crate::core::{CancellationToken, Error, Result, TestId};
use crate::coverage::{BlockSet, ProfileFilter};

/// Configuration for the test orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum concurrent parallel-safe runs (0 = available parallelism).
    pub jobs: usize,
    /// Directory receiving per-test coverage artifacts.
    pub artifact_dir: PathBuf,
    /// Exclusion filter applied when loading coverage.
    pub filter: ProfileFilter,
    /// Show a progress bar when stderr is a terminal.
    pub show_progress: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            artifact_dir: std::env::temp_dir(),
            filter: ProfileFilter::default(),
            show_progress: true,
        }
    }
}

impl OrchestratorConfig {
    /// Set the number of parallel jobs.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the artifact directory.
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set the profile filter.
    pub fn filter(mut self, filter: ProfileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Enable or disable the progress bar.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Get the effective number of jobs.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1)
        } else {
            self.jobs
        }
    }
}

/// A test that could not produce coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub test: TestId,
    pub reason: String,
}

/// Coverage collected from one orchestrator pass.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Coverage of every test that ran successfully.
    pub coverage: HashMap<TestId, BlockSet>,
    /// Successful tests in discovery order.
    pub order: Vec<TestId>,
    /// Tests excluded from selection, in completion order.
    pub failures: Vec<RunFailure>,
}

impl RunOutcome {
    /// Number of tests with usable coverage.
    pub fn succeeded(&self) -> usize {
        self.coverage.len()
    }
}

/// Owns the accumulated results. Only the collecting task mutates it.
struct Collector {
    outcome: RunOutcome,
    progress: RunProgress,
}

impl Collector {
    fn record(&mut self, test: TestId, result: Result<BlockSet>) -> Result<()> {
        match result {
            Ok(coverage) => {
                let index = self.progress.record(&test.qualified_name(), true);
                tracing::debug!(
                    "[{index}/{}] {test} OK ({} blocks)",
                    self.progress.total(),
                    coverage.len()
                );
                self.outcome.coverage.insert(test, coverage);
                Ok(())
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                let index = self.progress.record(&test.qualified_name(), false);
                tracing::warn!("[{index}/{}] {test} FAILED: {err}", self.progress.total());
                self.outcome.failures.push(RunFailure {
                    test,
                    reason: err.to_string(),
                });
                Ok(())
            }
        }
    }

    fn finish(mut self, tests: &[TestId]) -> RunOutcome {
        self.progress.finish();
        self.outcome.order = tests
            .iter()
            .filter(|t| self.outcome.coverage.contains_key(*t))
            .cloned()
            .collect();
        self.outcome
    }
}

/// Runs tests through a [`TestRunner`].
pub struct Orchestrator<R> {
    runner: Arc<R>,
    config: OrchestratorConfig,
}

impl<R: TestRunner> Orchestrator<R> {
    /// Create an orchestrator around `runner`.
    pub fn new(runner: Arc<R>, config: OrchestratorConfig) -> Self {
        Self { runner, config }
    }

    /// Get the orchestrator configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every test in `tests` once.
    ///
    /// Tests in `parallel_safe` share a bounded pool; all others run
    /// sequentially first. Failed runs are recorded, not fatal. Cancellation
    /// aborts in-flight runs and returns [`Error::Cancelled`] without any
    /// partial outcome.
    pub async fn run(
        &self,
        tests: &[TestId],
        parallel_safe: &HashSet<TestId>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        cancel.check()?;

        let (parallel, serial): (Vec<&TestId>, Vec<&TestId>) =
            tests.iter().partition(|t| parallel_safe.contains(*t));

        let progress = if self.config.show_progress {
            RunProgress::new(tests.len(), "Running")
        } else {
            RunProgress::hidden(tests.len())
        };
        let mut collector = Collector {
            outcome: RunOutcome::default(),
            progress,
        };

        if !serial.is_empty() {
            tracing::info!("Running {} serial tests sequentially", serial.len());
        }
        for test in serial {
            let result = run_one(
                self.runner.as_ref(),
                test,
                &self.config.artifact_dir,
                &self.config.filter,
                cancel,
            )
            .await;
            collector.record(test.clone(), result)?;
            cancel.check()?;
        }

        if !parallel.is_empty() {
            let jobs = self.config.effective_jobs();
            tracing::info!(
                "Running {} parallel-safe tests with {jobs} workers",
                parallel.len()
            );
            self.run_parallel(&parallel, jobs, &mut collector, cancel)
                .await?;
        }

        Ok(collector.finish(tests))
    }

    async fn run_parallel(
        &self,
        tests: &[&TestId],
        jobs: usize,
        collector: &mut Collector,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
        let (tx, mut rx) = mpsc::channel::<(TestId, Result<BlockSet>)>(tests.len());
        let mut workers = JoinSet::new();

        for &test in tests {
            let semaphore = Arc::clone(&semaphore);
            let runner = Arc::clone(&self.runner);
            let tx = tx.clone();
            let cancel = cancel.clone();
            let dir = self.config.artifact_dir.clone();
            let filter = self.config.filter.clone();
            let test = test.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }
                let result = run_one(runner.as_ref(), &test, &dir, &filter, &cancel).await;
                let _ = tx.send((test, result)).await;
            });
        }
        drop(tx);

        let mut received = HashSet::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    workers.abort_all();
                    return Err(Error::Cancelled);
                }
                message = rx.recv() => match message {
                    Some((test, result)) => {
                        received.insert(test.clone());
                        if let Err(err) = collector.record(test, result) {
                            workers.abort_all();
                            return Err(err);
                        }
                    }
                    None => break,
                },
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                tracing::warn!("Test worker did not complete: {err}");
            }
        }

        // A worker that panicked never reported back.
        for &test in tests {
            if !received.contains(test) {
                collector.record(
                    test.clone(),
                    Err(Error::test_run(test.qualified_name(), "worker exited without a result")),
                )?;
            }
        }

        Ok(())
    }
}

async fn run_one<R: TestRunner + ?Sized>(
    runner: &R,
    test: &TestId,
    dir: &Path,
    filter: &ProfileFilter,
    cancel: &CancellationToken,
) -> Result<BlockSet> {
    let artifact = dir.join(artifact_name(test));
    let text = runner.run_for_coverage(test, &artifact, cancel).await?;
    BlockSet::load_from_record(&text, filter).map_err(|e| {
        Error::test_run(test.qualified_name(), format!("unreadable coverage: {e}"))
    })
}
