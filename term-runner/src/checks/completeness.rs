//! Null counts per column.

use super::{column_query_error, offending_columns_message};
use crate::core::{CheckKind, CheckOutcome, FailureKind, TestCheck, TestDeclaration};
use crate::prelude::*;
use crate::session::QuerySession;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Fails when any listed column of `table` contains a NULL.
///
/// Columns are checked in listed order and the failure message names only the
/// offending ones: `Column : Null count, b : 2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessCheck;

#[async_trait]
impl TestCheck for CompletenessCheck {
    fn name(&self) -> &str {
        CheckKind::Completeness.as_str()
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
            let nulls = session
                .null_count(table, column)
                .await
                .map_err(|e| column_query_error(e, "null count", table, column))?;
            debug!(check.column = %column, result.nulls = nulls, "Counted nulls");
            if nulls > 0 {
                offending.push((column.clone(), nulls));
            }
        }

        if offending.is_empty() {
            Ok(CheckOutcome::passed())
        } else {
            Ok(CheckOutcome::failed(
                FailureKind::Assertion,
                offending_columns_message("Column : Null count", &offending),
            ))
        }
    }
}
