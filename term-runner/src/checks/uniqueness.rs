//! Duplicate counts per column.

use super::{column_query_error, offending_columns_message};
use crate::core::{CheckKind, CheckOutcome, FailureKind, TestCheck, TestDeclaration};
use crate::prelude::*;
use crate::session::QuerySession;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Fails when any listed column of `table` has fewer distinct values than
/// rows.
///
/// The duplicate count is `rows - distinct`, with NULL counted as one distinct
/// value, so two NULLs in a column are one duplicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessCheck;

#[async_trait]
impl TestCheck for UniquenessCheck {
    fn name(&self) -> &str {
        CheckKind::Uniqueness.as_str()
    }

    #[instrument(skip_all, fields(
        test.name = %declaration.display_name(),
        test.table = ?declaration.table
    ))]
    async fn evaluate(
        &self,
        declaration: &TestDeclaration,
        session: &dyn QuerySession,
    ) -> Result<CheckOutcome> {
        let table = declaration.require_table()?;
        let columns = declaration.require_columns()?;

        let mut offending = Vec::new();
        for column in columns {
            let (total, distinct) = session
                .row_and_distinct_count(table, column)
                .await
                .map_err(|e| column_query_error(e, "distinct count", table, column))?;
            let duplicates = total.saturating_sub(distinct);
            debug!(
                check.column = %column,
                result.total = total,
                result.distinct = distinct,
                "Counted distinct values"
            );
            if duplicates > 0 {
                offending.push((column.clone(), duplicates));
            }
        }

        if offending.is_empty() {
            Ok(CheckOutcome::passed())
        } else {
            Ok(CheckOutcome::failed(
                FailureKind::Assertion,
                offending_columns_message("Column : Duplicate count", &offending),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TestStatus;
    use crate::test_helpers::{create_int_context, ScriptedSession};

    fn uniqueness(table: &str, columns: &[&str]) -> TestDeclaration {
        TestDeclaration::new("test_uniqueness")
            .with_name("unique")
            .with_table(table)
            .with_columns(columns.iter().copied())
    }

    #[tokio::test]
    async fn test_reports_duplicate_count() {
        // 10 rows, 8 distinct ids
        let ids = [1, 2, 3, 4, 5, 6, 7, 8, 1, 2];
        let ctx = create_int_context(
            "t",
            vec!["id"],
            ids.iter().map(|&id| vec![Some(id)]).collect(),
        )
        .await;

        let outcome = UniquenessCheck.run(&uniqueness("t", &["id"]), &ctx).await;
        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureKind::Assertion));
        assert_eq!(
            outcome.message.as_deref(),
            Some("Column : Duplicate count, id : 2")
        );
    }

    #[tokio::test]
    async fn test_unique_column_passes() {
        let ctx = create_int_context(
            "t",
            vec!["id", "v"],
            vec![vec![Some(1), Some(1)], vec![Some(2), Some(1)]],
        )
        .await;

        assert!(UniquenessCheck
            .run(&uniqueness("t", &["id"]), &ctx)
            .await
            .is_passed());

        let outcome = UniquenessCheck.run(&uniqueness("t", &["id", "v"]), &ctx).await;
        assert_eq!(
            outcome.message.as_deref(),
            Some("Column : Duplicate count, v : 1")
        );
    }

    #[tokio::test]
    async fn test_repeated_nulls_are_duplicates() {
        let ctx = create_int_context(
            "t",
            vec!["v"],
            vec![vec![Some(1)], vec![None], vec![None]],
        )
        .await;

        let outcome = UniquenessCheck.run(&uniqueness("t", &["v"]), &ctx).await;
        assert_eq!(
            outcome.message.as_deref(),
            Some("Column : Duplicate count, v : 1")
        );

        let ctx = create_int_context("t", vec!["v"], vec![vec![Some(1)], vec![None]]).await;
        assert!(UniquenessCheck
            .run(&uniqueness("t", &["v"]), &ctx)
            .await
            .is_passed());
    }

    #[tokio::test]
    async fn test_session_failure_becomes_query_failure() {
        let session = ScriptedSession::default().with_distinct_error("t", "id", "table vanished");
        let outcome = UniquenessCheck
            .run(&uniqueness("t", &["id"]), &session)
            .await;

        assert_eq!(outcome.failure, Some(FailureKind::Query));
        let message = outcome.message.unwrap();
        assert!(message.contains("t.id"), "{message}");
        assert!(message.contains("table vanished"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_columns_is_a_configuration_failure() {
        let decl = TestDeclaration::new("test_uniqueness").with_table("t");
        let outcome = UniquenessCheck.run(&decl, &ScriptedSession::default()).await;
        assert_eq!(outcome.failure, Some(FailureKind::Configuration));
        assert!(outcome.message.unwrap().contains("'columns_to_test'"));
    }
}
