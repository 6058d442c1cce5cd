//! Built-in check implementations.
//!
//! Each check is a stateless unit struct implementing
//! [`TestCheck`](crate::core::TestCheck) and is registered under the key
//! returned by its `name`:
//!
//! | Key | Check |
//! |---|---|
//! | `test_custom` | [`CustomCheck`] |
//! | `test_completeness` | [`CompletenessCheck`] |
//! | `test_uniqueness` | [`UniquenessCheck`] |

mod completeness;
mod custom;
mod uniqueness;

pub use completeness::CompletenessCheck;
pub use custom::CustomCheck;
pub use uniqueness::UniquenessCheck;

use crate::error::TermError;

/// Adds the table and column to a failed count query.
fn column_query_error(error: TermError, what: &str, table: &str, column: &str) -> TermError {
    match error {
        TermError::Query { message } => {
            TermError::query(format!("{what} on {table}.{column} failed: {message}"))
        }
        other => other,
    }
}

/// The engine's own message for query errors, the full display otherwise.
fn engine_message(error: &TermError) -> String {
    match error {
        TermError::Query { message } => message.clone(),
        other => other.to_string(),
    }
}

/// Joins `(column, count)` pairs into `"<header>, a : 1, b : 2"`.
fn offending_columns_message(header: &str, offending: &[(String, u64)]) -> String {
    let listed: Vec<String> = offending
        .iter()
        .map(|(column, count)| format!("{column} : {count}"))
        .collect();
    format!("{header}, {}", listed.join(", "))
}
