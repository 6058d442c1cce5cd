//! Sessions for unit tests: real DataFusion contexts over in-memory tables and
//! a scripted session for driving checks and the executor into exact states.

use crate::prelude::*;
use crate::session::{QueryResult, QuerySession};
use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Registers `table` with nullable Int64 `columns`, one inner vec per row.
pub async fn create_int_context(
    table: &str,
    columns: Vec<&str>,
    rows: Vec<Vec<Option<i64>>>,
) -> SessionContext {
    let ctx = SessionContext::new();

    let fields: Vec<Field> = columns
        .iter()
        .map(|&name| Field::new(name, DataType::Int64, true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = (0..columns.len())
        .map(|col_idx| {
            let values: Vec<Option<i64>> = rows.iter().map(|row| row[col_idx]).collect();
            Arc::new(Int64Array::from(values)) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let provider = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    ctx.register_table(table, Arc::new(provider)).unwrap();

    ctx
}

#[derive(Debug, Clone)]
enum Scripted<T> {
    Value(T),
    Error(String),
}

impl<T: Clone> Scripted<T> {
    fn get(&self) -> Result<T> {
        match self {
            Scripted::Value(v) => Ok(v.clone()),
            Scripted::Error(message) => Err(TermError::query(message)),
        }
    }
}

/// A session whose answers are set up front.
///
/// Unscripted counts are zero; unscripted queries fail. A query whose SQL was
/// registered with [`ScriptedSession::with_panic`] panics, which is how the
/// executor's isolation is exercised.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    null_counts: HashMap<(String, String), Scripted<u64>>,
    distinct_counts: HashMap<(String, String), Scripted<(u64, u64)>>,
    queries: HashMap<String, Scripted<QueryResult>>,
    panics: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedSession {
    pub fn with_null_count(mut self, table: &str, column: &str, nulls: u64) -> Self {
        self.null_counts
            .insert((table.into(), column.into()), Scripted::Value(nulls));
        self
    }

    pub fn with_distinct_count(mut self, table: &str, column: &str, total: u64, distinct: u64) -> Self {
        self.distinct_counts.insert(
            (table.into(), column.into()),
            Scripted::Value((total, distinct)),
        );
        self
    }

    pub fn with_distinct_error(mut self, table: &str, column: &str, message: &str) -> Self {
        self.distinct_counts.insert(
            (table.into(), column.into()),
            Scripted::Error(message.into()),
        );
        self
    }

    pub fn with_query(mut self, sql: &str, result: QueryResult) -> Self {
        self.queries.insert(sql.into(), Scripted::Value(result));
        self
    }

    pub fn with_query_error(mut self, sql: &str, message: &str) -> Self {
        self.queries.insert(sql.into(), Scripted::Error(message.into()));
        self
    }

    pub fn with_panic(mut self, sql: &str) -> Self {
        self.panics.push(sql.into());
        self
    }

    /// Delays every call, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of session calls made so far.
    pub fn query_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl QuerySession for ScriptedSession {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.enter().await;
        if self.panics.iter().any(|p| p == sql) {
            panic!("scripted panic for {sql}");
        }
        self.queries
            .get(sql)
            .map(Scripted::get)
            .unwrap_or_else(|| Err(TermError::query(format!("no scripted result for '{sql}'"))))
    }

    async fn null_count(&self, table: &str, column: &str) -> Result<u64> {
        self.enter().await;
        self.null_counts
            .get(&(table.to_string(), column.to_string()))
            .map_or(Ok(0), Scripted::get)
    }

    async fn row_and_distinct_count(&self, table: &str, column: &str) -> Result<(u64, u64)> {
        self.enter().await;
        self.distinct_counts
            .get(&(table.to_string(), column.to_string()))
            .map_or(Ok((0, 0)), Scripted::get)
    }
}

/// A one-row, one-column Int64 result.
pub fn single_value(column: &str, value: i64) -> QueryResult {
    let schema = Arc::new(Schema::new(vec![Field::new(column, DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from(vec![value])) as ArrayRef],
    )
    .unwrap();
    QueryResult::new(schema, vec![batch])
}
