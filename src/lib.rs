//! Rustle Bootstrap - phase pipeline for bringing up k0s clusters
//!
//! This crate runs ordered phases against a fleet of hosts. Each phase fans
//! its work out to the hosts concurrently and the pipeline stops at the first
//! phase that fails. Hosts are driven through an OS specific configurer that
//! issues idempotent remote primitives over a pluggable connection.

pub mod config;
pub mod configurer;
pub mod connection;
pub mod phase;
pub mod types;

pub use config::ConfigError;
pub use configurer::{Configurer, ConfigurerError};
pub use phase::{Manager, ManagerConfig, Phase, PhaseError, PipelineError};
pub use types::*;
