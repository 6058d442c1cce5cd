//! Assertion language for custom checks.
//!
//! A custom check runs a user query and then asks a yes/no question about the
//! result. The question is written in a deliberately small language: the query
//! result is the only thing in scope (bound as `df`), and all that can be done
//! with it is read cells, count rows and compute simple column aggregates.
//!
//! ```text
//! df[0]['x'] == 5
//! df.count() > 0 and df.nulls('email') == 0
//! df.collect()[0].total_amount >= 1000.5
//! len(df) == df.distinct('id')
//! not df.is_empty() or df.max('ts') > '2024-01-01'
//! ```
//!
//! Supported:
//! - literals: integers, floats, `'strings'` / `"strings"`, `true`/`false`
//!   (`True`/`False`), `null` (`None`)
//! - `==`, `!=`, `<`, `<=`, `>`, `>=`, `and`, `or`, `not`, `+`, `-`, `*`, `/`
//! - `df[i]['col']`, `df[i]["col"]`, `df[i].col` (negative `i` counts from the end)
//! - `df.count()`, `len(df)`, `df.is_empty()`, `df.first()`, `df.collect()`
//! - `df.sum('c')`, `df.min('c')`, `df.max('c')`, `df.avg('c')`,
//!   `df.nulls('c')`, `df.distinct('c')`
//! - `abs(x)`, `len('text')`
//!
//! The expression must produce a boolean. Assertions longer than
//! [`MAX_ASSERTION_LEN`] bytes or nested deeper than [`MAX_NESTING`] levels are
//! rejected before evaluation.

mod eval;
mod lexer;
mod parser;

pub use eval::{Value, RESULT_NAME};
pub use parser::MAX_NESTING;

use crate::prelude::*;
use crate::session::QueryResult;
use eval::Evaluator;
use lexer::Lexer;
use parser::{Expr, Parser};

/// Longest assertion accepted, in bytes.
pub const MAX_ASSERTION_LEN: usize = 4096;

/// A parsed assertion, ready to be evaluated against query results.
///
/// # Examples
///
/// ```rust
/// use term_runner::expression::Assertion;
///
/// assert!(Assertion::parse("df[0]['x'] == 5").is_ok());
/// assert!(Assertion::parse("df[0]['x'] = 5").is_err());
/// assert!(Assertion::parse("__import__('os')").is_ok()); // parses, but fails to evaluate
/// ```
#[derive(Debug, Clone)]
pub struct Assertion {
    source: String,
    expr: Expr,
}

impl Assertion {
    /// Parses an assertion.
    pub fn parse(source: &str) -> Result<Self> {
        if source.len() > MAX_ASSERTION_LEN {
            return Err(TermError::evaluation(format!(
                "assertion too long ({} bytes, max {MAX_ASSERTION_LEN})",
                source.len()
            )));
        }
        let tokens = Lexer::new(source).tokenize()?;
        let expr = Parser::new(tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// The original assertion text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the assertion with `df` bound to `result`.
    pub fn evaluate(&self, result: &QueryResult) -> Result<bool> {
        match Evaluator::new(result).eval(&self.expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(TermError::evaluation(format!(
                "assertion must evaluate to a bool, got {other}"
            ))),
        }
    }
}
