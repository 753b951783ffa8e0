//! loggate-core — shared types and configuration for the Loggate gateway.
//!
//! Everything downstream crates agree on lives here: the [`LogRecord`]
//! unit that flows through the ingestion pipeline, and the TOML
//! configuration model the daemon loads at startup.

pub mod config;
pub mod types;

pub use config::{Config, ConfigError};
pub use types::LogRecord;
