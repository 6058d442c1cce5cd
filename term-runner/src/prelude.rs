//! Prelude for commonly used types and traits in term-runner.

pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::logging::LogConfig;
