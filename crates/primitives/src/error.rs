//! Error types for configuration ingestion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when parsing or validating presenter configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// A config entry violates a structural requirement.
	#[error("invalid configuration: {0}")]
	InvalidConfiguration(String),

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
