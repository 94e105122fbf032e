//! Domain model for data-protection bookkeeping.
//!
//! Entities reference each other by identifier. A [`Snapshot`] owns one copy of
//! every entity and is the read-only input of a vacuuming pass.

pub mod column;
pub mod duration;
pub mod policy;
pub mod purpose;
pub mod snapshot;

pub use column::{ColumnKey, PersonalDataColumn};
pub use duration::{DurationError, RetentionPeriod};
pub use policy::{StoragePolicy, VacuumingPolicy};
pub use purpose::{LegalBasis, ModelError, Purpose};
pub use snapshot::Snapshot;
