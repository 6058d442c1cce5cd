//! Orchestration of a whole test run.

use super::{resolve, CheckRegistry, CompletedTask, FailureKind, ResultRecord, TestDeclaration, TestExecutor};
use crate::config::RunnerConfig;
use crate::loader::TestLoader;
use crate::prelude::*;
use crate::session::QuerySession;
use crate::sink::ResultSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// What a run produced.
///
/// `records` holds one entry per declaration in completion order;
/// `failures` is aligned with it and carries the failure category, which the
/// records themselves do not.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One result row per declaration
    pub records: Vec<ResultRecord>,
    /// Failure category per record, `None` for passed tests
    pub failures: Vec<Option<FailureKind>>,
    /// Wall time from resolution to the last outcome
    pub elapsed: Duration,
}

impl RunReport {
    /// Normalizes completed tasks into records.
    pub fn from_completed(completed: Vec<CompletedTask>, elapsed: Duration) -> Self {
        let (records, failures) = completed
            .iter()
            .map(|done| {
                (
                    ResultRecord::from_outcome(&done.task.declaration, &done.outcome),
                    done.outcome.failure,
                )
            })
            .unzip();
        Self {
            records,
            failures,
            elapsed,
        }
    }

    /// Number of tests run.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Number of tests that passed.
    pub fn passed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.test_result.is_passed())
            .count()
    }

    /// Number of tests that failed, for any reason.
    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Returns true if every test passed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed records with their failure category.
    pub fn failed_records(&self) -> impl Iterator<Item = (&ResultRecord, Option<FailureKind>)> {
        self.records
            .iter()
            .zip(self.failures.iter().copied())
            .filter(|(record, _)| record.test_result.is_failed())
    }

    /// Number of failures of the given category.
    pub fn count_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| **f == Some(kind)).count()
    }
}

/// Runs declarations end to end: resolve, execute, normalize.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use datafusion::prelude::SessionContext;
/// use term_runner::config::RunnerConfig;
/// use term_runner::core::{TestDeclaration, TestRunner};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let runner = TestRunner::with_builtin_checks(RunnerConfig::default());
/// let tests = vec![TestDeclaration::new("test_custom")
///     .with_name("five")
///     .with_select("SELECT 5 as x")
///     .with_assert("df[0]['x'] == 5")];
///
/// let report = runner.run(tests, Arc::new(SessionContext::new())).await.unwrap();
/// assert_eq!(report.passed(), 1);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TestRunner {
    config: RunnerConfig,
    registry: CheckRegistry,
}

impl TestRunner {
    /// Creates a runner resolving check kinds against `registry`.
    pub fn new(config: RunnerConfig, registry: CheckRegistry) -> Self {
        Self { config, registry }
    }

    /// A runner over the built-in check kinds.
    pub fn with_builtin_checks(config: RunnerConfig) -> Self {
        Self::new(config, CheckRegistry::global().clone())
    }

    /// The runner's configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// The check kinds this runner can resolve.
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Runs `declarations` against `session`.
    ///
    /// Fails before running anything if the configuration is invalid or any
    /// declaration names an unknown check kind. Otherwise the report holds
    /// exactly one record per declaration.
    #[instrument(skip_all, fields(run.tests = declarations.len()))]
    pub async fn run(
        &self,
        declarations: Vec<TestDeclaration>,
        session: Arc<dyn QuerySession>,
    ) -> Result<RunReport> {
        self.config.validate()?;
        let start = Instant::now();

        let tasks = resolve(declarations, &self.registry)?;
        let completed = TestExecutor::new(self.config.executor_config())
            .execute(tasks, session)
            .await;
        let report = RunReport::from_completed(completed, start.elapsed());

        if self.config.log.log_run_summary {
            info!(
                run.total = report.total(),
                run.passed = report.passed(),
                run.failed = report.failed(),
                run.elapsed_ms = report.elapsed.as_millis() as u64,
                "Test run complete"
            );
        }
        Ok(report)
    }

    /// Runs `declarations` and appends the records to `sink`.
    pub async fn run_and_sink(
        &self,
        declarations: Vec<TestDeclaration>,
        session: Arc<dyn QuerySession>,
        sink: &dyn ResultSink,
    ) -> Result<RunReport> {
        let report = self.run(declarations, session).await?;
        sink.append(&report.records).await?;
        Ok(report)
    }

    /// Loads every test in the configured directory, runs them and appends
    /// the records to `sink`.
    pub async fn run_config_dir(
        &self,
        session: Arc<dyn QuerySession>,
        sink: &dyn ResultSink,
    ) -> Result<RunReport> {
        let declarations = TestLoader::new(&self.config.config_dir).load()?;
        self.run_and_sink(declarations, session, sink).await
    }
}
