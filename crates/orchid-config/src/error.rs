use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  /// The config file could not be read from disk.
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The config file is not valid YAML.
  #[error("failed to parse YAML config at {path}: {message}")]
  Parse { path: PathBuf, message: String },

  /// The top level of a config file must be a mapping.
  #[error("config at {path} must be a YAML mapping at the top level")]
  NotAMapping { path: PathBuf },

  /// A material overlay was requested but its file does not exist.
  #[error("material config not found for material '{material_id}', expected {path}")]
  MaterialNotFound { material_id: String, path: PathBuf },

  /// The merged config failed schema or range validation.
  #[error("config validation failed: {message}")]
  Validation { message: String },
}
