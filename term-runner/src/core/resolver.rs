//! Binding declarations to check implementations.

use super::check::SharedCheck;
use super::{CheckRegistry, TestDeclaration};
use crate::prelude::*;
use std::sync::Arc;
use tracing::{debug, error};

/// A declaration paired with the check that will run it.
#[derive(Debug, Clone)]
pub struct BoundTask {
    /// Position of the declaration in the input sequence
    pub index: usize,
    /// The declaration, shared with the task that runs it
    pub declaration: Arc<TestDeclaration>,
    /// The resolved check
    pub check: SharedCheck,
}

impl BoundTask {
    /// Name used in logs and errors.
    pub fn display_name(&self) -> &str {
        self.declaration.display_name()
    }
}

/// Resolves every declaration against `registry`.
///
/// Resolution is all-or-nothing: if any declaration names an unregistered
/// kind, no task is returned and nothing should run.
///
/// # Examples
///
/// ```rust
/// use term_runner::core::{resolve, CheckRegistry, TestDeclaration};
///
/// let declarations = vec![
///     TestDeclaration::new("test_completeness").with_name("a"),
///     TestDeclaration::new("test_nonexistent").with_name("b"),
/// ];
///
/// let err = resolve(declarations, CheckRegistry::global()).unwrap_err();
/// assert_eq!(err.to_string(), "Unknown check kind 'test_nonexistent' in test 'b'");
/// ```
pub fn resolve(
    declarations: Vec<TestDeclaration>,
    registry: &CheckRegistry,
) -> Result<Vec<BoundTask>> {
    declarations
        .into_iter()
        .enumerate()
        .map(|(index, declaration)| {
            let check = registry
                .lookup(&declaration.function, declaration.display_name())
                .inspect_err(|_| {
                    error!(
                        test.name = %declaration.display_name(),
                        test.function = %declaration.function,
                        test.index = index,
                        "Unknown check kind"
                    );
                })?;

            debug!(
                test.name = %declaration.display_name(),
                test.function = %declaration.function,
                "Resolved test"
            );

            Ok(BoundTask {
                index,
                declaration: Arc::new(declaration),
                check,
            })
        })
        .collect()
}
