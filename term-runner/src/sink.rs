//! Destinations for result records.
//!
//! Sinks only ever append. A run hands its records over in one call, in
//! whatever order the executor produced them.

use crate::core::ResultRecord;
use crate::prelude::*;
use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Receives the records of a run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Appends `records`. Previously appended records are never touched.
    async fn append(&self, records: &[ResultRecord]) -> Result<()>;
}

/// Appends one JSON object per record to a file.
///
/// The file is created if missing and never truncated, so repeated runs
/// accumulate history.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for JsonLinesSink {
    #[instrument(skip(self, records), fields(sink.path = %self.path.display(), sink.records = records.len()))]
    async fn append(&self, records: &[ResultRecord]) -> Result<()> {
        let mut buffer = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| TermError::Serialization(e.to_string()))?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended results");
        Ok(())
    }
}

/// Keeps the results queryable as a table of a [`SessionContext`].
///
/// Each append adds a batch and re-registers the table with everything
/// appended so far, so `SELECT * FROM <table>` always sees the full history
/// of this sink.
///
/// # Examples
///
/// ```rust
/// use datafusion::prelude::SessionContext;
/// use term_runner::sink::SessionTableSink;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let ctx = SessionContext::new();
/// let sink = SessionTableSink::new(ctx.clone(), "test_results").await.unwrap();
///
/// let rows = ctx.sql("SELECT * FROM test_results").await.unwrap().collect().await.unwrap();
/// assert_eq!(rows.iter().map(|b| b.num_rows()).sum::<usize>(), 0);
/// # });
/// ```
pub struct SessionTableSink {
    ctx: SessionContext,
    table: String,
    batches: Mutex<Vec<RecordBatch>>,
}

impl fmt::Debug for SessionTableSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self
            .batches
            .try_lock()
            .map(|batches| batches.iter().map(RecordBatch::num_rows).sum::<usize>());
        let mut debug = f.debug_struct("SessionTableSink");
        debug.field("table", &self.table);
        match rows {
            Ok(rows) => debug.field("rows", &rows),
            Err(_) => debug.field("rows", &"<locked>"),
        };
        debug.finish()
    }
}

impl SessionTableSink {
    /// Registers the result table named `table` in `ctx`.
    ///
    /// A table already registered under that name (for example the results
    /// of earlier runs read from Parquet or JSON lines) is kept as the start
    /// of the history: its rows are cast to [`ResultRecord::schema`] by column
    /// name, and new records are appended after them. A table missing one of
    /// the result columns, or holding values that cannot be cast, is a
    /// configuration error.
    pub async fn new(ctx: SessionContext, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let history = if ctx.table_exist(table.as_str())? {
            existing_rows(&ctx, &table).await?
        } else {
            Vec::new()
        };

        debug!(
            sink.table = %table,
            sink.existing = history.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "Opened result table"
        );

        let sink = Self {
            ctx,
            table,
            batches: Mutex::new(history.clone()),
        };
        sink.register(history)?;
        Ok(sink)
    }

    /// Name of the result table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Number of rows in the result table, earlier history included.
    pub async fn len(&self) -> usize {
        self.batches
            .lock()
            .await
            .iter()
            .map(RecordBatch::num_rows)
            .sum()
    }

    /// Returns true if the result table has no rows.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn register(&self, batches: Vec<RecordBatch>) -> Result<()> {
        let provider = MemTable::try_new(ResultRecord::schema(), vec![batches])?;
        self.ctx.deregister_table(self.table.as_str())?;
        self.ctx
            .register_table(self.table.as_str(), Arc::new(provider))?;
        Ok(())
    }
}

/// Collects the rows of an already registered result table.
async fn existing_rows(ctx: &SessionContext, table: &str) -> Result<Vec<RecordBatch>> {
    let schema = ResultRecord::schema();
    let batches = ctx.table(table).await?.collect().await?;
    batches
        .iter()
        .filter(|batch| batch.num_rows() > 0)
        .map(|batch| {
            conform(batch, &schema).map_err(|e| {
                TermError::Configuration(format!(
                    "existing table '{table}' cannot hold results: {e}"
                ))
            })
        })
        .collect()
}

/// Reorders and casts `batch` to `schema`, matching columns by name.
fn conform(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let column = batch.column_by_name(field.name()).ok_or_else(|| {
                TermError::Configuration(format!("missing column '{}'", field.name()))
            })?;
            Ok(cast(column, field.data_type())?)
        })
        .collect::<Result<Vec<ArrayRef>>>()?;
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

#[async_trait]
impl ResultSink for SessionTableSink {
    #[instrument(skip(self, records), fields(sink.table = %self.table, sink.records = records.len()))]
    async fn append(&self, records: &[ResultRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch = ResultRecord::to_record_batch(records)?;
        let mut batches = self.batches.lock().await;
        batches.push(batch);
        if let Err(e) = self.register(batches.clone()) {
            batches.pop();
            return Err(e);
        }

        debug!(
            sink.total = batches.iter().map(RecordBatch::num_rows).sum::<usize>(),
            "Re-registered result table"
        );
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything appended so far.
    pub async fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, records: &[ResultRecord]) -> Result<()> {
        self.records.lock().await.extend_from_slice(records);
        Ok(())
    }
}
