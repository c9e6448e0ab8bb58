//! Orchid Config
//!
//! This crate contains the serializable run-configuration types for Orchid
//! and the resolution step that turns config files into a fully-merged,
//! validated configuration.
//!
//! Configuration is resolved in three layers:
//! 1. The default config file (YAML mapping)
//! 2. An optional per-material overlay (`materials/<id>.yaml`)
//! 3. Typed CLI overrides (runs dir, structure path, run name)
//!
//! The result carries both the typed [`RootConfig`] and a normalized
//! `serde_json::Value` snapshot of it. The snapshot is what downstream
//! layers hash and record in run artifacts, so defaults are always
//! materialized and two configs that merge to the same settings produce
//! the same snapshot.

mod error;
mod model;
mod resolve;

pub use error::ConfigError;
pub use model::{
  CalculatorConfig, OutputConfig, PbcConfig, RelaxConfig, RootConfig, RunConfig, ScfConfig,
  StructureConfig, ValidationConfig,
};
pub use resolve::{Overrides, ResolvedConfig, deep_merge, load_yaml_file, resolve};
