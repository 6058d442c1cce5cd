//! The fixed-schema result row and the normalization that produces it.

use super::{CheckOutcome, TestDeclaration, TestStatus};
use crate::prelude::*;
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Column names of the result table, in order.
pub const RESULT_COLUMNS: [&str; 9] = [
    "name",
    "dataset",
    "table",
    "function",
    "select",
    "assert",
    "test_result",
    "error",
    "finish_time",
];

static RESULT_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    let mut fields: Vec<Field> = RESULT_COLUMNS[..8]
        .iter()
        .map(|name| Field::new(*name, DataType::Utf8, true))
        .collect();
    fields.push(Field::new(
        "finish_time",
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        true,
    ));
    Arc::new(Schema::new(fields))
});

/// One row of the result table.
///
/// Every declaration yields exactly one record, whatever happened to its
/// check. The first six fields are copied from the declaration; the last
/// three come from the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub function: Option<String>,
    pub select: Option<String>,
    pub assert: Option<String>,
    pub test_result: TestStatus,
    pub error: Option<String>,
    pub finish_time: DateTime<Utc>,
}

impl ResultRecord {
    /// Normalizes a declaration and its outcome into a result row.
    ///
    /// This is a pure function of its inputs, so normalizing the same pair
    /// twice produces identical records.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use term_runner::core::{CheckOutcome, FailureKind, ResultRecord, TestDeclaration};
    ///
    /// let decl = TestDeclaration::new("test_uniqueness")
    ///     .with_name("ids_unique")
    ///     .with_table("orders");
    /// let outcome = CheckOutcome::failed(FailureKind::Assertion, "Column : Duplicate count, id : 2");
    ///
    /// let record = ResultRecord::from_outcome(&decl, &outcome);
    /// assert_eq!(record.test_result.as_str(), "failed");
    /// assert_eq!(record.table.as_deref(), Some("orders"));
    /// assert!(record.select.is_none());
    /// ```
    pub fn from_outcome(declaration: &TestDeclaration, outcome: &CheckOutcome) -> Self {
        Self {
            name: declaration.name.clone(),
            dataset: declaration.dataset.clone(),
            table: declaration.table.clone(),
            function: Some(declaration.function.clone()),
            select: declaration.select.clone(),
            assert: declaration.assert.clone(),
            test_result: outcome.status,
            error: outcome.message.clone(),
            finish_time: outcome.finished_at,
        }
    }

    /// Returns the Arrow schema of the result table.
    pub fn schema() -> SchemaRef {
        RESULT_SCHEMA.clone()
    }

    /// Converts records into a single Arrow batch with [`ResultRecord::schema`].
    pub fn to_record_batch(records: &[ResultRecord]) -> Result<RecordBatch> {
        fn utf8<'a>(
            records: &'a [ResultRecord],
            field: impl Fn(&'a ResultRecord) -> Option<&'a str>,
        ) -> ArrayRef {
            Arc::new(records.iter().map(field).collect::<StringArray>())
        }

        let finish_times: TimestampMicrosecondArray = records
            .iter()
            .map(|r| Some(r.finish_time.timestamp_micros()))
            .collect::<TimestampMicrosecondArray>()
            .with_timezone("UTC");

        let columns: Vec<ArrayRef> = vec![
            utf8(records, |r| r.name.as_deref()),
            utf8(records, |r| r.dataset.as_deref()),
            utf8(records, |r| r.table.as_deref()),
            utf8(records, |r| r.function.as_deref()),
            utf8(records, |r| r.select.as_deref()),
            utf8(records, |r| r.assert.as_deref()),
            utf8(records, |r| Some(r.test_result.as_str())),
            utf8(records, |r| r.error.as_deref()),
            Arc::new(finish_times),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }
}
