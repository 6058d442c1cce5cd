//! Rendering run reports for people and programs.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use term_runner::core::RunReport;
//! use term_runner::formatters::{FormatterConfig, HumanFormatter, ResultFormatter};
//!
//! let report = RunReport::from_completed(Vec::new(), Duration::from_millis(3));
//! let text = HumanFormatter::with_config(FormatterConfig::minimal())
//!     .format(&report)
//!     .unwrap();
//! assert!(text.contains("All 0 tests passed"));
//! ```

use crate::core::{RunReport, ResultRecord};
use crate::prelude::*;
use std::fmt::Write;

/// Options shared by the formatters.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// List passed tests as well as failed ones
    pub include_passed: bool,
    /// Maximum number of failures to list (-1 for all)
    pub max_failures: i32,
    /// Whether to use ANSI colors (human formatter)
    pub use_colors: bool,
    /// Whether to print each test's finish time
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_passed: false,
            max_failures: -1,
            use_colors: true,
            include_timestamps: false,
        }
    }
}

impl FormatterConfig {
    /// Summary line and failures only, no colors.
    pub fn minimal() -> Self {
        Self {
            include_passed: false,
            max_failures: -1,
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Every test, with timestamps.
    pub fn detailed() -> Self {
        Self {
            include_passed: true,
            max_failures: -1,
            use_colors: true,
            include_timestamps: true,
        }
    }

    /// Plain text with a bounded failure list.
    pub fn ci() -> Self {
        Self {
            include_passed: false,
            max_failures: 50,
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_passed(mut self, include: bool) -> Self {
        self.include_passed = include;
        self
    }

    pub fn with_max_failures(mut self, max: i32) -> Self {
        self.max_failures = max;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Turns a run report into text.
pub trait ResultFormatter {
    fn format(&self, report: &RunReport) -> Result<String>;
}

/// Writes the report's records as a JSON array, one object per test with the
/// nine result-table fields.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, report: &RunReport) -> Result<String> {
        let serialized = if self.pretty {
            serde_json::to_string_pretty(&report.records)
        } else {
            serde_json::to_string(&report.records)
        };
        serialized.map_err(|e| {
            TermError::Serialization(format!("Failed to serialize results to JSON: {e}"))
        })
    }
}

/// Console output: a summary line, then one line per failed test.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.config.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn write_record(&self, output: &mut String, record: &ResultRecord) -> std::fmt::Result {
        let name = record
            .name
            .as_deref()
            .or(record.function.as_deref())
            .unwrap_or("<unnamed>");
        let status = if record.test_result.is_passed() {
            self.paint("PASS", "32")
        } else {
            self.paint("FAIL", "31")
        };

        write!(output, "  {status} {name}")?;
        if let Some(function) = &record.function {
            write!(output, " [{function}]")?;
        }
        if self.config.include_timestamps {
            write!(output, " at {}", record.finish_time.to_rfc3339())?;
        }
        writeln!(output)?;
        if let Some(error) = &record.error {
            writeln!(output, "       {error}")?;
        }
        Ok(())
    }

    fn write_report(&self, output: &mut String, report: &RunReport) -> std::fmt::Result {
        let elapsed_ms = report.elapsed.as_millis();
        if report.is_success() {
            let line = format!("All {} tests passed", report.total());
            writeln!(output, "{} ({elapsed_ms}ms)", self.paint(&line, "32"))?;
        } else {
            let line = format!("{} of {} tests failed", report.failed(), report.total());
            writeln!(output, "{} ({elapsed_ms}ms)", self.paint(&line, "31"))?;
        }

        if self.config.include_passed {
            for record in report.records.iter().filter(|r| r.test_result.is_passed()) {
                self.write_record(output, record)?;
            }
        }

        let failed: Vec<&ResultRecord> = report.failed_records().map(|(r, _)| r).collect();
        let shown = if self.config.max_failures < 0 {
            failed.len()
        } else {
            failed.len().min(self.config.max_failures as usize)
        };
        for record in &failed[..shown] {
            self.write_record(output, record)?;
        }
        if failed.len() > shown {
            writeln!(output, "  ... and {} more failures", failed.len() - shown)?;
        }
        Ok(())
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, report: &RunReport) -> Result<String> {
        let mut output = String::new();
        self.write_report(&mut output, report)
            .map_err(|e| TermError::Internal(format!("Failed to format report: {e}")))?;
        Ok(output)
    }
}
