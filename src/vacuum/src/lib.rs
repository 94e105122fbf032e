//! purposedb vacuuming engine
//!
//! Resolves retention rules into deletion statements and runs them, either
//! on demand or from a periodic scheduling loop.
//!
//! # Pipeline
//!
//! - Load a [`Snapshot`](common::model::Snapshot) from a [`SnapshotSource`]
//! - Resolve it with a per-pass [`PolicyIndex`] into [`DeletionExecution`]s
//!   and [`Feedback`]
//! - Hand each statement to a [`QueryExecutor`]
//! - Return a [`VacuumReport`]

pub mod audit;
pub mod execution;
pub mod executor;
pub mod feedback;
pub mod metrics;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod source;
pub mod vacuumer;
pub mod worker;

// Re-export commonly used types
pub use audit::{AuditHook, AuditOutcome, Audited, Operation, TracingAuditHook};
pub use execution::DeletionExecution;
pub use executor::{ExecutorError, QueryExecutor, SqlExecutor};
pub use feedback::Feedback;
pub use metrics::{MetricsSummary, VacuumMetrics};
pub use report::{ExecutionOutcome, OutcomeStatus, SkipReason, Trigger, VacuumReport};
pub use resolver::{PolicyIndex, Resolution, enforce, generate_all};
pub use scheduler::{due_policies, next_execution, should_execute};
pub use source::{InMemorySource, SnapshotSource, SourceError};
pub use vacuumer::{VacuumError, VacuumService, Vacuumer};
pub use worker::VacuumScheduler;
