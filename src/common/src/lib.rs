pub mod catalog;
pub mod cli;
pub mod config;
pub mod model;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use catalog::Catalog;
