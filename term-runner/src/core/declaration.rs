//! Test declarations as read from configuration.

use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// One configured test, before it is bound to a check.
///
/// Declarations are produced by the [`TestLoader`](crate::loader::TestLoader)
/// (or built directly) and consumed exactly once by
/// [`resolve`](crate::core::resolve). Only `function` is required; every other
/// field is check-specific, and unknown keys in the YAML are ignored.
///
/// # Examples
///
/// ```rust
/// use term_runner::core::TestDeclaration;
///
/// let decl = TestDeclaration::new("test_completeness")
///     .with_name("orders_not_null")
///     .with_table("orders")
///     .with_columns(["order_id", "customer_id"]);
///
/// assert_eq!(decl.display_name(), "orders_not_null");
/// assert_eq!(decl.columns_to_test.as_ref().map(Vec::len), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDeclaration {
    /// Identifies the test in the results
    #[serde(default)]
    pub name: Option<String>,
    /// Check-kind key, e.g. `test_completeness`
    pub function: String,
    /// Free-form dataset label carried into the results
    #[serde(default)]
    pub dataset: Option<String>,
    /// Table the check reads, e.g. `catalog.schema.table`
    #[serde(default)]
    pub table: Option<String>,
    /// Columns inspected by the completeness and uniqueness checks
    #[serde(default)]
    pub columns_to_test: Option<Vec<String>>,
    /// Query run by the custom check
    #[serde(default)]
    pub select: Option<String>,
    /// Boolean assertion evaluated against the query result
    #[serde(default)]
    pub assert: Option<String>,
}

impl TestDeclaration {
    /// Creates a declaration for the given check kind with no other fields set.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            name: None,
            function: function.into(),
            dataset: None,
            table: None,
            columns_to_test: None,
            select: None,
            assert: None,
        }
    }

    /// Sets the test name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the dataset label.
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Sets the table under test.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Sets the columns to test.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns_to_test = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the query of a custom check.
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Sets the assertion of a custom check.
    pub fn with_assert(mut self, assert: impl Into<String>) -> Self {
        self.assert = Some(assert.into());
        self
    }

    /// Name used in logs and errors; falls back to the check kind.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.function)
    }

    /// Returns the table, or a missing-field error.
    pub fn require_table(&self) -> Result<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| TermError::missing_field("table", &self.function))
    }

    /// Returns the columns to test, or a missing-field error.
    ///
    /// An empty list is accepted; it trivially passes.
    pub fn require_columns(&self) -> Result<&[String]> {
        self.columns_to_test
            .as_deref()
            .ok_or_else(|| TermError::missing_field("columns_to_test", &self.function))
    }

    /// Returns the custom query, or a missing-field error.
    pub fn require_select(&self) -> Result<&str> {
        self.select
            .as_deref()
            .ok_or_else(|| TermError::missing_field("select", &self.function))
    }

    /// Returns the custom assertion, or a missing-field error.
    pub fn require_assert(&self) -> Result<&str> {
        self.assert
            .as_deref()
            .ok_or_else(|| TermError::missing_field("assert", &self.function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_yaml_ignores_unknown_keys() {
        let yaml = r#"
name: iris_complete
function: test_completeness
dataset: sample_data
table: hive_metastore.sample_data.iris_data
columns_to_test: [sepal_length, target]
owner: data-platform
"#;
        let decl: TestDeclaration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(decl.name.as_deref(), Some("iris_complete"));
        assert_eq!(decl.function, "test_completeness");
        assert_eq!(
            decl.columns_to_test,
            Some(vec!["sepal_length".to_string(), "target".to_string()])
        );
        assert!(decl.select.is_none());
    }

    #[test]
    fn test_function_is_required() {
        let yaml = "name: no_kind\ntable: t\n";
        assert!(serde_yaml::from_str::<TestDeclaration>(yaml).is_err());
    }

    #[test]
    fn test_require_helpers() {
        let decl = TestDeclaration::new("test_custom").with_select("SELECT 1");
        assert_eq!(decl.require_select().unwrap(), "SELECT 1");

        let err = decl.require_assert().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field 'assert' for check 'test_custom'"
        );
    }

    #[test]
    fn test_display_name_falls_back_to_function() {
        let decl = TestDeclaration::new("test_uniqueness");
        assert_eq!(decl.display_name(), "test_uniqueness");
    }
}
