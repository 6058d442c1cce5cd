//! Outcome of running a single check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a test passed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The check held
    Passed,
    /// The check did not hold, or could not be run
    Failed,
}

impl TestStatus {
    /// Returns the value written to the `test_result` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
        }
    }

    /// Returns true if this is a Passed status.
    pub fn is_passed(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }

    /// Returns true if this is a Failed status.
    pub fn is_failed(&self) -> bool {
        matches!(self, TestStatus::Failed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a test failed.
///
/// The result table only has a free-text `error` column, so this never reaches
/// the sink. It is kept on the outcome for reports and logs, where telling a
/// data problem apart from an infrastructure problem matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The data violated the check
    Assertion,
    /// A query against the session failed
    Query,
    /// The assertion expression could not be evaluated
    Evaluation,
    /// The declaration is missing something the check needs
    Configuration,
    /// The task panicked, timed out or was cancelled
    TaskFault,
}

impl FailureKind {
    /// Returns a short lowercase label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Assertion => "assertion",
            FailureKind::Query => "query",
            FailureKind::Evaluation => "evaluation",
            FailureKind::Configuration => "configuration",
            FailureKind::TaskFault => "task_fault",
        }
    }
}

/// The result of running one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Passed or failed
    pub status: TestStatus,
    /// Diagnostic message, always present on failure
    pub message: Option<String>,
    /// Failure category, `None` when passed
    pub failure: Option<FailureKind>,
    /// When the check completed
    pub finished_at: DateTime<Utc>,
}

impl CheckOutcome {
    /// Creates a passed outcome stamped with the current time.
    pub fn passed() -> Self {
        Self {
            status: TestStatus::Passed,
            message: None,
            failure: None,
            finished_at: Utc::now(),
        }
    }

    /// Creates a failed outcome stamped with the current time.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            message: Some(message.into()),
            failure: Some(kind),
            finished_at: Utc::now(),
        }
    }

    /// Overrides the completion timestamp.
    pub fn at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self
    }

    /// Returns true if the check passed.
    pub fn is_passed(&self) -> bool {
        self.status.is_passed()
    }
}
