//! Bounded concurrent execution of bound tasks.

use super::{BoundTask, CheckOutcome, FailureKind};
use crate::logging::LogConfig;
use crate::prelude::*;
use crate::session::QuerySession;
use futures::FutureExt;
use std::any::Any;
use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

/// Limits applied while executing a batch of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of checks running at once
    pub max_concurrency: usize,
    /// Deadline for a single check, none by default
    pub task_timeout: Option<Duration>,
    /// What gets logged per completed test
    pub log: LogConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().max(1),
            task_timeout: None,
            log: LogConfig::default(),
        }
    }
}

impl ExecutorConfig {
    /// Sets the concurrency limit. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Sets a per-check deadline.
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Sets what is logged for each completed test.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

/// A task together with the outcome it produced.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    /// The task as it was bound
    pub task: BoundTask,
    /// What its check reported, or the fault that stopped it
    pub outcome: CheckOutcome,
}

/// Runs bound tasks concurrently and collects one outcome per task.
///
/// Every task given to [`execute`](TestExecutor::execute) comes back exactly
/// once, whatever happens to it: a check that panics, overruns its deadline
/// or is lost by the runtime gets a failed outcome carrying the fault,
/// and its siblings keep running.
#[derive(Debug, Clone, Default)]
pub struct TestExecutor {
    config: ExecutorConfig,
}

impl TestExecutor {
    /// Creates an executor with the given limits.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The executor's limits.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes `tasks` against `session`.
    ///
    /// Results are returned in completion order.
    #[instrument(skip_all, fields(
        executor.tasks = tasks.len(),
        executor.max_concurrency = self.config.max_concurrency
    ))]
    pub async fn execute(
        &self,
        tasks: Vec<BoundTask>,
        session: Arc<dyn QuerySession>,
    ) -> Vec<CompletedTask> {
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut pending: Vec<Option<BoundTask>> = tasks.iter().cloned().map(Some).collect();
        let mut completed = Vec::with_capacity(tasks.len());
        let mut running = JoinSet::new();

        for (slot, task) in tasks.into_iter().enumerate() {
            let permits = Arc::clone(&permits);
            let session = Arc::clone(&session);
            let timeout = self.config.task_timeout;

            running.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => run_isolated(&task, session.as_ref(), timeout).await,
                    Err(_) => CheckOutcome::failed(
                        FailureKind::TaskFault,
                        TermError::task_fault(task.display_name(), "executor closed before start")
                            .to_string(),
                    ),
                };
                (slot, outcome)
            });
        }

        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    if let Some(task) = pending.get_mut(slot).and_then(Option::take) {
                        log_outcome(&self.config.log, &task, &outcome);
                        completed.push(CompletedTask { task, outcome });
                    }
                }
                Err(e) => {
                    error!(error = %e, "Task lost at join");
                }
            }
        }

        // Anything still pending never reported back; it still gets a record.
        for task in pending.into_iter().flatten() {
            let outcome = CheckOutcome::failed(
                FailureKind::TaskFault,
                TermError::task_fault(task.display_name(), "task was cancelled before reporting")
                    .to_string(),
            );
            log_outcome(&self.config.log, &task, &outcome);
            completed.push(CompletedTask { task, outcome });
        }

        completed
    }
}

/// Runs one check, turning panics and timeouts into failed outcomes.
async fn run_isolated(
    task: &BoundTask,
    session: &dyn QuerySession,
    timeout: Option<Duration>,
) -> CheckOutcome {
    let run = AssertUnwindSafe(task.check.run(&task.declaration, session)).catch_unwind();

    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(caught) => caught,
            Err(_) => {
                return CheckOutcome::failed(
                    FailureKind::TaskFault,
                    TermError::task_fault(task.display_name(), format!("timed out after {limit:?}"))
                        .to_string(),
                )
            }
        },
        None => run.await,
    };

    caught.unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        error!(
            test.name = %task.display_name(),
            test.function = %task.declaration.function,
            panic = %reason,
            "Check panicked"
        );
        CheckOutcome::failed(
            FailureKind::TaskFault,
            TermError::task_fault(task.display_name(), format!("panicked: {reason}")).to_string(),
        )
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// User text as it appears in log fields, cut to the configured length.
fn logged<'a>(log: &LogConfig, value: Option<&'a str>) -> Cow<'a, str> {
    log.truncate(value.unwrap_or(""))
}

fn log_outcome(log: &LogConfig, task: &BoundTask, outcome: &CheckOutcome) {
    let declaration = &task.declaration;
    if outcome.is_passed() {
        if !log.log_check_details {
            return;
        }
        debug!(
            test.name = %task.display_name(),
            test.function = %declaration.function,
            test.select = %logged(log, declaration.select.as_deref()),
            test.assert = %logged(log, declaration.assert.as_deref()),
            "Test passed"
        );
    } else {
        warn!(
            test.name = %task.display_name(),
            test.function = %declaration.function,
            test.select = %logged(log, declaration.select.as_deref()),
            test.assert = %logged(log, declaration.assert.as_deref()),
            test.failure = outcome.failure.map(|kind| kind.as_str()).unwrap_or("unknown"),
            test.error = %logged(log, outcome.message.as_deref()),
            "Test failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{resolve, CheckRegistry, TestCheck, TestDeclaration};
    use crate::test_helpers::{single_value, ScriptedSession};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn custom(name: &str, select: &str) -> TestDeclaration {
        TestDeclaration::new("test_custom")
            .with_name(name)
            .with_select(select)
            .with_assert("df[0].x == 1")
    }

    fn bind(declarations: Vec<TestDeclaration>) -> Vec<BoundTask> {
        resolve(declarations, CheckRegistry::global()).unwrap()
    }

    #[tokio::test]
    async fn test_every_task_completes_once() {
        let session = ScriptedSession::default()
            .with_query("SELECT 1 AS x", single_value("x", 1))
            .with_query("SELECT 2 AS x", single_value("x", 2));
        let tasks = bind(vec![
            custom("one", "SELECT 1 AS x"),
            custom("two", "SELECT 2 AS x"),
            custom("missing", "SELECT 3 AS x"),
        ]);

        let completed = TestExecutor::default()
            .execute(tasks, Arc::new(session))
            .await;

        assert_eq!(completed.len(), 3);
        let indexes: HashSet<usize> = completed.iter().map(|c| c.task.index).collect();
        assert_eq!(indexes, HashSet::from([0, 1, 2]));

        let by_name = |name: &str| {
            completed
                .iter()
                .find(|c| c.task.display_name() == name)
                .map(|c| c.outcome.clone())
                .unwrap()
        };
        assert!(by_name("one").is_passed());
        assert_eq!(by_name("two").failure, Some(FailureKind::Assertion));
        assert_eq!(by_name("missing").failure, Some(FailureKind::Query));
    }

    #[tokio::test]
    async fn test_panicking_check_is_isolated() {
        let session = ScriptedSession::default()
            .with_query("SELECT 1 AS x", single_value("x", 1))
            .with_panic("SELECT boom");
        let tasks = bind(vec![
            custom("before", "SELECT 1 AS x"),
            custom("explodes", "SELECT boom"),
            custom("after", "SELECT 1 AS x"),
        ]);

        let completed = TestExecutor::default()
            .execute(tasks, Arc::new(session))
            .await;

        assert_eq!(completed.len(), 3);
        for done in &completed {
            if done.task.display_name() == "explodes" {
                assert_eq!(done.outcome.failure, Some(FailureKind::TaskFault));
                let message = done.outcome.message.as_deref().unwrap();
                assert!(message.contains("explodes"), "{message}");
                assert!(message.contains("scripted panic"), "{message}");
            } else {
                assert!(done.outcome.is_passed(), "{:?}", done.outcome);
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_fails_the_slow_task() {
        let session = ScriptedSession::default()
            .with_query("SELECT 1 AS x", single_value("x", 1))
            .with_delay(Duration::from_millis(200));
        let executor = TestExecutor::new(
            ExecutorConfig::default().with_task_timeout(Duration::from_millis(10)),
        );

        let completed = executor
            .execute(bind(vec![custom("slow", "SELECT 1 AS x")]), Arc::new(session))
            .await;

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].outcome.failure, Some(FailureKind::TaskFault));
        assert!(completed[0]
            .outcome
            .message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[derive(Debug, Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TestCheck for Gauge {
        fn name(&self) -> &str {
            "test_gauge"
        }

        async fn evaluate(
            &self,
            _declaration: &TestDeclaration,
            _session: &dyn QuerySession,
        ) -> Result<CheckOutcome> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(CheckOutcome::passed())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let gauge = Arc::new(Gauge::default());
        let registry = CheckRegistry::new().with_check("test_gauge", gauge.clone());
        let declarations = (0..20).map(|_| TestDeclaration::new("test_gauge")).collect();
        let tasks = resolve(declarations, &registry).unwrap();

        let executor = TestExecutor::new(ExecutorConfig::default().with_max_concurrency(2));
        let completed = executor
            .execute(tasks, Arc::new(ScriptedSession::default()))
            .await;

        assert_eq!(completed.len(), 20);
        assert!(completed.iter().all(|c| c.outcome.is_passed()));
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let completed = TestExecutor::default()
            .execute(Vec::new(), Arc::new(ScriptedSession::default()))
            .await;
        assert!(completed.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_logged_text_follows_log_config() {
        let select = format!("SELECT {} FROM t", "x, ".repeat(100));

        let short = LogConfig::production();
        assert!(logged(&short, Some(&select)).ends_with("...(truncated)"));
        assert!(logged(&short, Some(&select)).len() < select.len());

        let verbose = LogConfig::verbose();
        assert_eq!(logged(&verbose, Some(&select)), select.as_str());
        assert_eq!(logged(&verbose, None), "");
    }
}
