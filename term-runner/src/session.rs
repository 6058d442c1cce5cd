//! The query-session seam between checks and the data store.
//!
//! Checks never touch DataFusion directly. They receive a `&dyn QuerySession`,
//! which keeps them testable against scripted sessions and makes the surface
//! the runner needs from the engine explicit: one free-form query and two
//! column statistics.

use crate::prelude::*;
use crate::security::SqlSecurity;
use arrow::array::Array;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::execution::context::SQLOptions;
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use tracing::{debug, instrument};

/// Tabular result of a query: a schema and the collected Arrow batches.
#[derive(Debug, Clone)]
pub struct QueryResult {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl QueryResult {
    /// Wraps collected batches.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// The result schema.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// The underlying batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across all batches.
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Returns true if the query produced no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.schema.index_of(column).map_err(|_| {
            let available: Vec<&str> = self
                .schema
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect();
            TermError::evaluation(format!(
                "column '{column}' not in query result (available: {})",
                available.join(", ")
            ))
        })
    }

    /// Returns the value at `row` in `column`.
    pub fn cell(&self, row: usize, column: &str) -> Result<ScalarValue> {
        let index = self.column_index(column)?;
        let mut offset = row;
        for batch in &self.batches {
            if offset < batch.num_rows() {
                return Ok(ScalarValue::try_from_array(batch.column(index), offset)?);
            }
            offset -= batch.num_rows();
        }
        Err(TermError::evaluation(format!(
            "row index {row} out of range for result with {} rows",
            self.num_rows()
        )))
    }

    /// Returns every value of `column`, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<ScalarValue>> {
        let index = self.column_index(column)?;
        let mut values = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = batch.column(index);
            for row in 0..array.len() {
                values.push(ScalarValue::try_from_array(array, row)?);
            }
        }
        Ok(values)
    }
}

/// Handle to the data store a run executes against.
///
/// Implementations must be safe to share across concurrently running checks
/// and must not let one check change session-wide state for the others.
#[async_trait]
pub trait QuerySession: Send + Sync {
    /// Runs a read-only query and collects its result.
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Counts NULL values of `column` in `table`.
    async fn null_count(&self, table: &str, column: &str) -> Result<u64>;

    /// Returns `(total rows, distinct values)` of `column` in `table`.
    ///
    /// NULL counts as one distinct value when present.
    async fn row_and_distinct_count(&self, table: &str, column: &str) -> Result<(u64, u64)>;
}

/// Statement options for user SQL: queries only, no DDL, DML or `SET`.
fn read_only_options() -> SQLOptions {
    SQLOptions::new()
        .with_allow_ddl(false)
        .with_allow_dml(false)
        .with_allow_statements(false)
}

async fn collect(ctx: &SessionContext, sql: &str) -> Result<QueryResult> {
    let df = ctx
        .sql_with_options(sql, read_only_options())
        .await
        .map_err(TermError::query)?;
    let schema: SchemaRef = df.schema().inner().clone();
    let batches = df.collect().await.map_err(TermError::query)?;
    Ok(QueryResult::new(schema, batches))
}

/// Reads a non-negative count from the first row of a result.
fn count_at(result: &QueryResult, column: &str) -> Result<u64> {
    match result.cell(0, column) {
        Ok(ScalarValue::Int64(Some(v))) if v >= 0 => Ok(v as u64),
        Ok(ScalarValue::UInt64(Some(v))) => Ok(v),
        Ok(other) => Err(TermError::Internal(format!(
            "Unexpected value for {column}: {other:?}"
        ))),
        Err(e) => Err(TermError::Internal(format!("Failed to extract {column}: {e}"))),
    }
}

#[async_trait]
impl QuerySession for SessionContext {
    #[instrument(skip(self, sql))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        SqlSecurity::validate_query(sql)?;
        collect(self, sql).await
    }

    #[instrument(skip(self))]
    async fn null_count(&self, table: &str, column: &str) -> Result<u64> {
        let table_ref = SqlSecurity::escape_identifier(table)?;
        let column_ref = SqlSecurity::escape_column(column)?;
        let sql = format!(
            "SELECT COUNT(*) - COUNT({column_ref}) AS null_count FROM {table_ref}"
        );

        let result = collect(self, &sql).await?;
        let nulls = count_at(&result, "null_count")?;
        debug!(table, column, nulls, "Counted null values");
        Ok(nulls)
    }

    #[instrument(skip(self))]
    async fn row_and_distinct_count(&self, table: &str, column: &str) -> Result<(u64, u64)> {
        let table_ref = SqlSecurity::escape_identifier(table)?;
        let column_ref = SqlSecurity::escape_column(column)?;
        let sql = format!(
            "SELECT
                COUNT(*) AS total_count,
                COUNT(DISTINCT {column_ref})
                    + CASE WHEN COUNT({column_ref}) < COUNT(*) THEN 1 ELSE 0 END AS distinct_count
             FROM {table_ref}"
        );

        let result = collect(self, &sql).await?;
        let total = count_at(&result, "total_count")?;
        let distinct = count_at(&result, "distinct_count")?;
        debug!(table, column, total, distinct, "Counted distinct values");
        Ok((total, distinct))
    }
}
