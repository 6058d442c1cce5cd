//! # term-runner - declarative data-quality tests on DataFusion
//!
//! Data-quality tests are written as YAML, one mapping per test, and run
//! concurrently against tables registered in a DataFusion [`SessionContext`].
//! Every test yields exactly one row in a fixed nine-column result table, no
//! matter whether it passed, failed, or could not run at all.
//!
//! [`SessionContext`]: datafusion::prelude::SessionContext
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use datafusion::prelude::*;
//! use term_runner::config::RunnerConfig;
//! use term_runner::core::TestRunner;
//! use term_runner::loader::TestLoader;
//! use term_runner::sink::SessionTableSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = SessionContext::new();
//! ctx.register_csv("orders", "data/orders.csv", CsvReadOptions::new()).await?;
//!
//! let tests = TestLoader::load_str(r#"
//! - name: orders_complete
//!   function: test_completeness
//!   table: orders
//!   columns_to_test: [id, customer_id]
//! - name: orders_unique
//!   function: test_uniqueness
//!   table: orders
//!   columns_to_test: [id]
//! - name: has_revenue
//!   function: test_custom
//!   select: SELECT SUM(amount) AS total FROM orders
//!   assert: df[0]['total'] > 0
//! "#)?;
//!
//! let sink = SessionTableSink::new(ctx.clone(), "test_results").await?;
//! let runner = TestRunner::with_builtin_checks(RunnerConfig::default());
//! let report = runner.run_and_sink(tests, Arc::new(ctx.clone()), &sink).await?;
//!
//! println!("{} of {} tests passed", report.passed(), report.total());
//! ctx.sql("SELECT * FROM test_results").await?.show().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Check kinds
//!
//! | `function` | Needs | Fails when |
//! |---|---|---|
//! | `test_completeness` | `table`, `columns_to_test` | any listed column has a NULL |
//! | `test_uniqueness` | `table`, `columns_to_test` | any listed column has a repeated value |
//! | `test_custom` | `select`, `assert` | the assertion over the query result is false |
//!
//! Custom assertions use a small expression language over the query result,
//! described in [`expression`].
//!
//! ## Architecture
//!
//! - **`core`**: declarations, the check registry, resolution, the concurrent
//!   executor, result normalization and the [`TestRunner`](core::TestRunner)
//! - **`checks`**: the built-in check implementations
//! - **`session`**: the [`QuerySession`](session::QuerySession) seam and its
//!   DataFusion implementation
//! - **`expression`**: the assertion language
//! - **`loader`** / **`sink`**: YAML input and result output
//! - **`formatters`**, **`logging`**, **`config`**: reporting and setup

pub mod checks;
pub mod config;
pub mod core;
pub mod error;
pub mod expression;
pub mod formatters;
pub mod loader;
pub mod logging;
pub mod prelude;
pub mod security;
pub mod session;
pub mod sink;

#[cfg(test)]
pub mod test_helpers;
