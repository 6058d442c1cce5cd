//! Property-based tests for the runner.
//!
//! - Totality: any batch of resolvable declarations yields exactly one record
//!   per declaration, carrying that declaration's fields, whatever mix of
//!   passing, failing and broken tests it contains.
//! - Normalization is a pure function of declaration and outcome.

use arrow::array::{ArrayRef, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use term_runner::config::RunnerConfig;
use term_runner::core::{CheckOutcome, FailureKind, ResultRecord, TestDeclaration, TestRunner};

fn context_with(values: &[Option<i64>]) -> SessionContext {
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Int64Array::from(values.to_vec())) as ArrayRef],
    )
    .unwrap();
    let ctx = SessionContext::new();
    ctx.register_table(
        "t",
        Arc::new(MemTable::try_new(schema, vec![vec![batch]]).unwrap()),
    )
    .unwrap();
    ctx
}

/// A declaration of any built-in kind, valid or not.
fn declaration() -> impl Strategy<Value = TestDeclaration> {
    let custom = (
        prop::sample::select(vec![
            "SELECT COUNT(*) AS n FROM t",
            "SELECT v FROM t",
            "SELECT missing FROM t",
            "NOT SQL AT ALL",
        ]),
        prop::sample::select(vec![
            "df.count() >= 0",
            "df[0]['n'] == 3",
            "df.nulls('v') == 0",
            "df[0] = 1",
            "df[100].v == 1",
        ]),
    )
        .prop_map(|(select, assert)| {
            TestDeclaration::new("test_custom")
                .with_select(select)
                .with_assert(assert)
        });

    let columns = prop::collection::vec(prop::sample::select(vec!["v", "w"]), 0..3);
    let completeness = (columns.clone(), prop::option::of(Just("t")))
        .prop_map(|(columns, table)| {
            let decl = TestDeclaration::new("test_completeness").with_columns(columns);
            match table {
                Some(table) => decl.with_table(table),
                None => decl,
            }
        });
    let uniqueness = columns.prop_map(|columns| {
        TestDeclaration::new("test_uniqueness")
            .with_table("t")
            .with_columns(columns)
    });

    (
        prop_oneof![custom, completeness, uniqueness],
        prop::option::of("[a-z]{1,8}"),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(decl, name, dataset)| {
            let decl = match name {
                Some(name) => decl.with_name(name),
                None => decl,
            };
            match dataset {
                Some(dataset) => decl.with_dataset(dataset),
                None => decl,
            }
        })
}

fn fingerprint(
    name: &Option<String>,
    dataset: &Option<String>,
    table: &Option<String>,
    function: &str,
    select: &Option<String>,
    assert: &Option<String>,
) -> String {
    format!("{name:?}|{dataset:?}|{table:?}|{function}|{select:?}|{assert:?}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_every_declaration_gets_exactly_one_record(
        values in prop::collection::vec(prop::option::of(0i64..5), 0..12),
        declarations in prop::collection::vec(declaration(), 0..16),
        concurrency in 1usize..6,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = context_with(&values);
            let mut expected: Vec<String> = declarations
                .iter()
                .map(|d| fingerprint(&d.name, &d.dataset, &d.table, &d.function, &d.select, &d.assert))
                .collect();

            let runner = TestRunner::with_builtin_checks(
                RunnerConfig::default().with_max_concurrency(concurrency),
            );
            let report = runner.run(declarations, Arc::new(ctx)).await.unwrap();

            let mut actual: Vec<String> = report
                .records
                .iter()
                .map(|r| {
                    fingerprint(
                        &r.name,
                        &r.dataset,
                        &r.table,
                        r.function.as_deref().unwrap(),
                        &r.select,
                        &r.assert,
                    )
                })
                .collect();

            expected.sort();
            actual.sort();
            prop_assert_eq!(actual, expected);

            for record in &report.records {
                prop_assert_eq!(record.test_result.is_failed(), record.error.is_some());
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_normalization_is_deterministic(
        declaration in declaration(),
        passed in any::<bool>(),
        message in "[ -~]{0,40}",
        micros in 0i64..4_000_000_000_000_000,
    ) {
        let finished_at = Utc.timestamp_micros(micros).unwrap();
        let outcome = if passed {
            CheckOutcome::passed()
        } else {
            CheckOutcome::failed(FailureKind::Assertion, message)
        }
        .at(finished_at);

        let first = ResultRecord::from_outcome(&declaration, &outcome);
        let second = ResultRecord::from_outcome(&declaration, &outcome);

        prop_assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        prop_assert_eq!(first.finish_time, finished_at);
        prop_assert_eq!(first.function.as_deref(), Some(declaration.function.as_str()));
    }

    #[test]
    fn test_completeness_counts_match_data(
        values in prop::collection::vec(prop::option::of(0i64..3), 1..20),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let nulls = values.iter().filter(|v| v.is_none()).count();
            let ctx = context_with(&values);
            let decl = TestDeclaration::new("test_completeness")
                .with_name("c")
                .with_table("t")
                .with_columns(["v"]);

            let report = TestRunner::with_builtin_checks(RunnerConfig::default())
                .run(vec![decl], Arc::new(ctx))
                .await
                .unwrap();

            let record = &report.records[0];
            if nulls == 0 {
                prop_assert!(record.test_result.is_passed());
            } else {
                let expected = format!("Column : Null count, v : {nulls}");
                prop_assert_eq!(record.error.as_deref(), Some(expected.as_str()));
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_uniqueness_counts_match_data(
        values in prop::collection::vec(prop::option::of(0i64..4), 1..20),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let distinct = values.iter().collect::<std::collections::HashSet<_>>().len();
            let duplicates = values.len() - distinct;
            let ctx = context_with(&values);
            let decl = TestDeclaration::new("test_uniqueness")
                .with_name("u")
                .with_table("t")
                .with_columns(["v"]);

            let report = TestRunner::with_builtin_checks(RunnerConfig::default())
                .run(vec![decl], Arc::new(ctx))
                .await
                .unwrap();

            let record = &report.records[0];
            if duplicates == 0 {
                prop_assert!(record.test_result.is_passed());
            } else {
                let expected = format!("Column : Duplicate count, v : {duplicates}");
                prop_assert_eq!(record.error.as_deref(), Some(expected.as_str()));
            }
            Ok(())
        })?;
    }
}
