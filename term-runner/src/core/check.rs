//! The contract shared by every check implementation.

use super::{CheckOutcome, FailureKind, TestDeclaration};
use crate::prelude::*;
use crate::session::QuerySession;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A check that can be run for a test declaration.
///
/// Implementations put their logic in [`evaluate`](TestCheck::evaluate) and
/// may use `?` freely; [`run`](TestCheck::run) is what the executor calls and
/// turns any error into a failed outcome, so one broken test never takes the
/// rest of the batch down with it. Checks must be stateless: the same
/// instance runs many declarations concurrently.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use term_runner::core::{CheckOutcome, FailureKind, TestCheck, TestDeclaration};
/// use term_runner::prelude::*;
/// use term_runner::session::QuerySession;
///
/// #[derive(Debug)]
/// struct NotEmpty;
///
/// #[async_trait]
/// impl TestCheck for NotEmpty {
///     fn name(&self) -> &str {
///         "test_not_empty"
///     }
///
///     async fn evaluate(
///         &self,
///         declaration: &TestDeclaration,
///         session: &dyn QuerySession,
///     ) -> Result<CheckOutcome> {
///         let table = declaration.require_table()?;
///         let rows = session.query(&format!("SELECT 1 FROM {table} LIMIT 1")).await?;
///         Ok(if rows.is_empty() {
///             CheckOutcome::failed(FailureKind::Assertion, format!("{table} is empty"))
///         } else {
///             CheckOutcome::passed()
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait TestCheck: Debug + Send + Sync {
    /// The check-kind key this implementation is registered under.
    fn name(&self) -> &str;

    /// Runs the check, returning an error for anything that kept it from
    /// reaching a verdict.
    async fn evaluate(
        &self,
        declaration: &TestDeclaration,
        session: &dyn QuerySession,
    ) -> Result<CheckOutcome>;

    /// Runs the check and never fails: errors become failed outcomes.
    async fn run(&self, declaration: &TestDeclaration, session: &dyn QuerySession) -> CheckOutcome {
        match self.evaluate(declaration, session).await {
            Ok(outcome) => outcome,
            Err(e) => CheckOutcome::failed(failure_kind_of(&e), e.to_string()),
        }
    }
}

/// A shareable check, as stored in the registry and bound to tasks.
pub type SharedCheck = Arc<dyn TestCheck>;

/// Classifies an error escaping a check.
pub fn failure_kind_of(error: &TermError) -> FailureKind {
    match error {
        TermError::Query { .. } | TermError::DataFusion(_) | TermError::Arrow(_) => {
            FailureKind::Query
        }
        TermError::Evaluation { .. } => FailureKind::Evaluation,
        TermError::MissingField { .. }
        | TermError::Configuration(_)
        | TermError::SecurityError(_)
        | TermError::Resolution { .. } => FailureKind::Configuration,
        TermError::TaskFault { .. } => FailureKind::TaskFault,
        TermError::Io(_)
        | TermError::Yaml(_)
        | TermError::Serialization(_)
        | TermError::Internal(_) => FailureKind::Query,
    }
}
