//! User query plus assertion.

use super::engine_message;
use crate::core::{CheckKind, CheckOutcome, FailureKind, TestCheck, TestDeclaration};
use crate::expression::Assertion;
use crate::prelude::*;
use crate::session::QuerySession;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Runs the declaration's `select` and evaluates its `assert` against the
/// result, bound as `df`.
///
/// The query runs first; if it fails, the assertion is not looked at. A false
/// assertion fails with `Failed <assert>`, so the record shows which
/// condition did not hold.
///
/// # Examples
///
/// ```rust
/// use datafusion::prelude::SessionContext;
/// use term_runner::checks::CustomCheck;
/// use term_runner::core::{TestCheck, TestDeclaration};
///
/// # tokio_test_block(async {
/// let ctx = SessionContext::new();
/// let declaration = TestDeclaration::new("test_custom")
///     .with_select("SELECT 5 AS x")
///     .with_assert("df[0]['x'] == 5");
///
/// assert!(CustomCheck.run(&declaration, &ctx).await.is_passed());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomCheck;

#[async_trait]
impl TestCheck for CustomCheck {
    fn name(&self) -> &str {
        CheckKind::Custom.as_str()
    }

    #[instrument(skip_all, fields(test.name = %declaration.display_name()))]
    async fn evaluate(
        &self,
        declaration: &TestDeclaration,
        session: &dyn QuerySession,
    ) -> Result<CheckOutcome> {
        let select = declaration.require_select()?;
        let assert = declaration.require_assert()?;

        debug!(
            check.select_len = select.len(),
            check.assert_len = assert.len(),
            "Running custom check"
        );

        let result = match session.query(select).await {
            Ok(result) => result,
            Err(e) => {
                return Ok(CheckOutcome::failed(
                    FailureKind::Query,
                    format!(
                        "select statement failed with exception {}",
                        engine_message(&e)
                    ),
                ))
            }
        };

        debug!(result.rows = result.num_rows(), "Query returned");

        let verdict = Assertion::parse(assert).and_then(|assertion| assertion.evaluate(&result));
        Ok(match verdict {
            Ok(true) => CheckOutcome::passed(),
            Ok(false) => CheckOutcome::failed(FailureKind::Assertion, format!("Failed {assert}")),
            Err(e) => CheckOutcome::failed(
                FailureKind::Evaluation,
                format!("assert statement failed with exception {}", engine_message(&e)),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TestStatus;
    use crate::test_helpers::{create_int_context, ScriptedSession};
    use datafusion::prelude::SessionContext;

    fn custom(select: &str, assert: &str) -> TestDeclaration {
        TestDeclaration::new("test_custom")
            .with_name("custom")
            .with_select(select)
            .with_assert(assert)
    }

    #[tokio::test]
    async fn test_true_assertion_passes() {
        let ctx = SessionContext::new();
        let outcome = CustomCheck
            .run(&custom("SELECT 5 as x", "df[0]['x'] == 5"), &ctx)
            .await;

        assert_eq!(outcome.status, TestStatus::Passed);
        assert!(outcome.message.is_none());
    }

    #[tokio::test]
    async fn test_false_assertion_names_the_assertion() {
        let ctx = SessionContext::new();
        let outcome = CustomCheck
            .run(&custom("SELECT 5 as x", "df[0]['x'] == 6"), &ctx)
            .await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureKind::Assertion));
        assert_eq!(outcome.message.as_deref(), Some("Failed df[0]['x'] == 6"));
    }

    #[tokio::test]
    async fn test_malformed_query_skips_the_assertion() {
        let ctx = SessionContext::new();
        // The assertion would not even parse; the query error must win.
        let outcome = CustomCheck
            .run(&custom("SELEC 5 as x", "df[0]['x'] = = 5"), &ctx)
            .await;

        assert_eq!(outcome.failure, Some(FailureKind::Query));
        let message = outcome.message.unwrap();
        assert!(
            message.starts_with("select statement failed with exception"),
            "{message}"
        );
    }

    #[tokio::test]
    async fn test_unparseable_assertion_is_an_evaluation_failure() {
        let ctx = SessionContext::new();
        let outcome = CustomCheck
            .run(&custom("SELECT 5 as x", "df[0]['x'] = 5"), &ctx)
            .await;

        assert_eq!(outcome.failure, Some(FailureKind::Evaluation));
        assert!(outcome
            .message
            .unwrap()
            .starts_with("assert statement failed with exception"));
    }

    #[tokio::test]
    async fn test_assertion_over_registered_table() {
        let ctx = create_int_context(
            "orders",
            vec!["id", "qty"],
            vec![
                vec![Some(1), Some(3)],
                vec![Some(2), None],
                vec![Some(3), Some(4)],
            ],
        )
        .await;

        let decl = custom(
            "SELECT COUNT(*) AS n, SUM(qty) AS total FROM orders",
            "df[0].n == 3 and df[0].total == 7",
        );
        assert!(CustomCheck.run(&decl, &ctx).await.is_passed());

        let decl = custom("SELECT id FROM orders WHERE qty IS NULL", "df.is_empty()");
        let outcome = CustomCheck.run(&decl, &ctx).await;
        assert_eq!(outcome.message.as_deref(), Some("Failed df.is_empty()"));
    }

    #[tokio::test]
    async fn test_missing_fields_fail_without_querying() {
        let session = ScriptedSession::default();

        let decl = TestDeclaration::new("test_custom").with_assert("true");
        let outcome = CustomCheck.run(&decl, &session).await;
        assert_eq!(outcome.failure, Some(FailureKind::Configuration));
        assert!(outcome.message.unwrap().contains("'select'"));

        let decl = TestDeclaration::new("test_custom").with_select("SELECT 1");
        let outcome = CustomCheck.run(&decl, &session).await;
        assert!(outcome.message.unwrap().contains("'assert'"));

        assert_eq!(session.query_count(), 0);
    }

    #[tokio::test]
    async fn test_scripted_query_error_skips_the_assertion() {
        let session = ScriptedSession::default()
            .with_query_error("SELECT * FROM gone", "table 'gone' not found");

        let outcome = CustomCheck
            .run(&custom("SELECT * FROM gone", "nope("), &session)
            .await;

        assert_eq!(outcome.failure, Some(FailureKind::Query));
        assert_eq!(
            outcome.message.as_deref(),
            Some("select statement failed with exception table 'gone' not found")
        );
        assert_eq!(session.query_count(), 1);
    }
}
