//! Mapping from check-kind keys to check implementations.

use super::check::SharedCheck;
use crate::checks::{CompletenessCheck, CustomCheck, UniquenessCheck};
use crate::prelude::*;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The built-in check kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    /// User SQL plus a boolean assertion over its result
    Custom,
    /// No NULLs in the listed columns
    Completeness,
    /// No duplicates in the listed columns
    Uniqueness,
}

impl CheckKind {
    /// Every built-in kind.
    pub const ALL: [CheckKind; 3] = [
        CheckKind::Custom,
        CheckKind::Completeness,
        CheckKind::Uniqueness,
    ];

    /// The key used in the `function` field of a declaration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Custom => "test_custom",
            CheckKind::Completeness => "test_completeness",
            CheckKind::Uniqueness => "test_uniqueness",
        }
    }

    /// Returns the implementation of this kind.
    pub fn check(&self) -> SharedCheck {
        match self {
            CheckKind::Custom => Arc::new(CustomCheck),
            CheckKind::Completeness => Arc::new(CompletenessCheck),
            CheckKind::Uniqueness => Arc::new(UniquenessCheck),
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = TermError;

    /// Exact, case-sensitive match on the key.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TermError::Configuration(format!("'{s}' is not a built-in check kind")))
    }
}

static GLOBAL: Lazy<CheckRegistry> = Lazy::new(CheckRegistry::builtin);

/// Check implementations by kind key.
///
/// A registry is built once and then only read. The process-wide
/// [`CheckRegistry::global`] holds the built-in kinds; callers that need
/// extra kinds build their own registry with [`CheckRegistry::with_check`]
/// before the run starts.
///
/// # Examples
///
/// ```rust
/// use term_runner::core::{CheckKind, CheckRegistry};
///
/// let registry = CheckRegistry::global();
/// assert!(registry.lookup("test_completeness", "orders_complete").is_ok());
/// assert!(registry.lookup("Test_Completeness", "orders_complete").is_err());
/// assert_eq!(registry.kinds().count(), CheckKind::ALL.len());
/// ```
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: BTreeMap<String, SharedCheck>,
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("kinds", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CheckRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in kinds.
    pub fn builtin() -> Self {
        CheckKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| {
                registry.with_check(kind.as_str(), kind.check())
            })
    }

    /// The shared, immutable registry of built-in kinds.
    pub fn global() -> &'static CheckRegistry {
        &GLOBAL
    }

    /// Registers `check` under `kind`, replacing any previous entry.
    pub fn with_check(mut self, kind: impl Into<String>, check: SharedCheck) -> Self {
        self.checks.insert(kind.into(), check);
        self
    }

    /// Looks up the check registered under `kind` for the test named `test`,
    /// or fails with a resolution error naming both.
    pub fn lookup(&self, kind: &str, test: &str) -> Result<SharedCheck> {
        self.checks
            .get(kind)
            .cloned()
            .ok_or_else(|| TermError::resolution(kind, test))
    }

    /// Registered kind keys, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }

    /// Returns true if `kind` is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.checks.contains_key(kind)
    }
}
