//! Input hardening for SQL built from test declarations.
//!
//! Table and column names from YAML are interpolated into the count queries
//! issued by the completeness and uniqueness checks, so they are validated
//! against a strict identifier grammar and quoted before use. Free-form
//! `select` statements are executed read-only by the session; here they only
//! get cheap size and byte checks.

use crate::error::{Result, TermError};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 128;
const MAX_QUERY_LEN: usize = 100_000;

static IDENTIFIER_PART: Lazy<Regex> = Lazy::new(|| {
    // Hard-coded pattern, known to compile.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Hard-coded regex pattern should be valid")
});

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates a possibly qualified identifier such as `catalog.schema.table`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use term_runner::security::SqlSecurity;
    ///
    /// assert!(SqlSecurity::validate_identifier("hive_metastore.sample_data.iris").is_ok());
    /// assert!(SqlSecurity::validate_identifier("id; DROP TABLE users--").is_err());
    /// assert!(SqlSecurity::validate_identifier("a..b").is_err());
    /// ```
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(TermError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LEN} characters)"
            )));
        }

        if identifier.split('.').count() > 3 {
            return Err(TermError::SecurityError(format!(
                "SQL identifier '{identifier}' has more than three parts"
            )));
        }

        for part in identifier.split('.') {
            if !IDENTIFIER_PART.is_match(part) {
                return Err(TermError::SecurityError(format!(
                    "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
                )));
            }
        }

        Ok(())
    }

    /// Validates and quotes a single column name.
    pub fn escape_column(column: &str) -> Result<String> {
        if column.contains('.') {
            return Err(TermError::SecurityError(format!(
                "Column name '{column}' cannot be qualified"
            )));
        }
        Self::escape_identifier(column)
    }

    /// Validates and quotes an identifier, quoting each dotted part separately.
    ///
    /// ```rust
    /// use term_runner::security::SqlSecurity;
    ///
    /// assert_eq!(
    ///     SqlSecurity::escape_identifier("sales.orders").unwrap(),
    ///     "\"sales\".\"orders\""
    /// );
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        Ok(identifier
            .split('.')
            .map(|part| format!("\"{part}\""))
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Checks a user-supplied query before it is sent to the session.
    pub fn validate_query(sql: &str) -> Result<()> {
        if sql.trim().is_empty() {
            return Err(TermError::SecurityError(
                "SQL query cannot be empty".to_string(),
            ));
        }

        if sql.len() > MAX_QUERY_LEN {
            return Err(TermError::SecurityError(format!(
                "SQL query too long (max {MAX_QUERY_LEN} characters)"
            )));
        }

        if sql.contains('\0') {
            return Err(TermError::SecurityError(
                "SQL query cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }
}
