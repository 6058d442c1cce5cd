//! The test dispatch and execution engine.
//!
//! ```text
//! Vec<TestDeclaration>
//!     │  resolve (registry lookup, all-or-nothing)
//!     ▼
//! Vec<BoundTask>
//!     │  TestExecutor::execute (bounded, isolated, one outcome per task)
//!     ▼
//! Vec<CompletedTask>
//!     │  ResultRecord::from_outcome
//!     ▼
//! Vec<ResultRecord> ──► ResultSink
//! ```
//!
//! [`TestRunner`] wires the stages together. The individual stages are public
//! for callers that need to drive them separately.

mod check;
mod declaration;
mod executor;
mod outcome;
mod record;
mod registry;
mod resolver;
mod runner;

pub use check::{failure_kind_of, SharedCheck, TestCheck};
pub use declaration::TestDeclaration;
pub use executor::{CompletedTask, ExecutorConfig, TestExecutor};
pub use outcome::{CheckOutcome, FailureKind, TestStatus};
pub use record::{ResultRecord, RESULT_COLUMNS};
pub use registry::{CheckKind, CheckRegistry};
pub use resolver::{resolve, BoundTask};
pub use runner::{RunReport, TestRunner};
