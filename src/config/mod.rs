//! Cluster file loading and structural validation.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{load_cluster_spec, parse_cluster_spec, validate, Format};
