//! Test utilities for purposedb.
//!
//! This module provides reusable builders for bookkeeping snapshots so tests
//! can describe purposes, policies and columns in a few lines.
//!
//! # Feature Flag
//!
//! This module is only available when the `testing` feature is enabled or during tests:
//!
//! ```toml
//! [dependencies]
//! common = { path = "../common", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use common::testing::SnapshotBuilder;
//!
//! let snapshot = SnapshotBuilder::new()
//!     .column("customers", "email", "redacted")
//!     .storage_policy("sp-marketing", "consent_withdrawn", ("customers", "email"))
//!     .purpose("marketing", &["sp-marketing"])
//!     .vacuuming_policy("daily", "1d", &["marketing"])
//!     .build();
//! ```

mod snapshot_builder;

pub use snapshot_builder::SnapshotBuilder;
