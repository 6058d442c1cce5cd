//! Error types for the Term test runner.
//!
//! All errors are represented by the [`TermError`] enum. Only a handful of them
//! ever stop a run: resolution failures (a declaration names a check kind
//! nobody registered) and I/O problems in the loader or sinks. Everything that
//! goes wrong while a single test executes is folded into that test's
//! [`CheckOutcome`](crate::core::CheckOutcome) instead.

use thiserror::Error;

/// The main error type for the Term test runner.
#[derive(Error, Debug)]
pub enum TermError {
    /// A declaration names a check kind that is not registered.
    #[error("Unknown check kind '{function}' in test '{test}'")]
    Resolution {
        /// The unresolved `function` value
        function: String,
        /// Name of the declaration that referenced it
        test: String,
    },

    /// The query issued by a check failed.
    #[error("Query failed: {message}")]
    Query {
        /// Message reported by the query engine
        message: String,
    },

    /// An assertion expression could not be parsed or evaluated.
    #[error("{message}")]
    Evaluation {
        /// What went wrong, including the position for syntax errors
        message: String,
    },

    /// A task faulted outside of its check's own error handling.
    #[error("Task for test '{test}' faulted: {message}")]
    TaskFault {
        /// Name of the declaration whose task faulted
        test: String,
        /// Panic payload or join error description
        message: String,
    },

    /// A declaration lacks a field its check needs.
    #[error("Missing required field '{field}' for check '{function}'")]
    MissingField {
        /// The missing field
        field: &'static str,
        /// The check kind that requires it
        function: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while parsing YAML test definitions.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a resolution error for an unknown check kind.
    pub fn resolution(function: impl Into<String>, test: impl Into<String>) -> Self {
        Self::Resolution {
            function: function.into(),
            test: test.into(),
        }
    }

    /// Creates a query error from any displayable engine error.
    pub fn query(message: impl std::fmt::Display) -> Self {
        Self::Query {
            message: message.to_string(),
        }
    }

    /// Creates an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Creates a task fault error.
    pub fn task_fault(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskFault {
            test: test.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: &'static str, function: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            function: function.into(),
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                TermError::Configuration(inner) => {
                    TermError::Configuration(format!("{msg}: {inner}"))
                }
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_names_kind_and_test() {
        let err = TermError::resolution("test_bogus", "orders_check");
        assert_eq!(
            err.to_string(),
            "Unknown check kind 'test_bogus' in test 'orders_check'"
        );
    }

    #[test]
    fn test_query_error_display() {
        let err = TermError::query("table 'missing' not found");
        assert_eq!(err.to_string(), "Query failed: table 'missing' not found");
    }

    #[test]
    fn test_missing_field() {
        let err = TermError::missing_field("table", "test_completeness");
        assert_eq!(
            err.to_string(),
            "Missing required field 'table' for check 'test_completeness'"
        );
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(TermError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation()
            .context("While loading tests")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: While loading tests: Something went wrong"
        );
    }

    #[test]
    fn test_io_error_context_wraps_message() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = io.with_context(|| "Reading tests.yml".to_string()).unwrap_err();
        assert!(err.to_string().contains("Reading tests.yml"));
        assert!(err.to_string().contains("no such file"));
    }
}
