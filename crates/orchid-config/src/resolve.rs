//! Config resolution: load, merge, override, validate.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::model::RootConfig;

/// Typed CLI overrides, applied after all file layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
  pub runs_dir: Option<String>,
  pub structure_path: Option<String>,
  pub run_name: Option<String>,
}

/// A fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
  /// The typed, validated configuration.
  pub config: RootConfig,
  /// Normalized snapshot of `config` with all defaults materialized.
  /// This is the value that gets hashed and recorded in run artifacts.
  pub resolved: Value,
  /// Which files and overrides contributed, for provenance.
  pub sources: Value,
}

/// Load a YAML file as a JSON object map.
///
/// An empty file resolves to an empty mapping; any other non-mapping top
/// level is rejected.
pub fn load_yaml_file(path: &Path) -> Result<Map<String, Value>, ConfigError> {
  let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
    path: path.to_path_buf(),
    source,
  })?;

  if text.trim().is_empty() {
    return Ok(Map::new());
  }

  let value: Value = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  match value {
    Value::Object(map) => Ok(map),
    Value::Null => Ok(Map::new()),
    _ => Err(ConfigError::NotAMapping {
      path: path.to_path_buf(),
    }),
  }
}

/// Deep-merge `overlay` onto `base`, returning a new map.
///
/// Nested objects merge recursively; any other value in the overlay
/// replaces the base value wholesale.
pub fn deep_merge(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
  let mut out = base.clone();
  for (key, value) in overlay {
    match (out.get(key), value) {
      (Some(Value::Object(existing)), Value::Object(incoming)) => {
        out.insert(key.clone(), Value::Object(deep_merge(existing, incoming)));
      }
      _ => {
        out.insert(key.clone(), value.clone());
      }
    }
  }
  out
}

/// Set a nested key, creating intermediate objects as needed.
fn set_nested(map: &mut Map<String, Value>, path: &[&str], value: Value) {
  let (first, rest) = match path {
    [first, rest @ ..] => (*first, rest),
    [] => return,
  };
  if rest.is_empty() {
    map.insert(first.to_string(), value);
    return;
  }
  let entry = map
    .entry(first.to_string())
    .or_insert_with(|| Value::Object(Map::new()));
  if !entry.is_object() {
    *entry = Value::Object(Map::new());
  }
  if let Value::Object(child) = entry {
    set_nested(child, rest, value);
  }
}

/// Resolve the layered configuration.
///
/// Merge order: the default file, then `materials/<material_id>.yaml` when a
/// material is given, then CLI overrides. The merged mapping is validated
/// against [`RootConfig`] (unknown keys rejected, ranges checked) and
/// re-serialized so the resolved snapshot always carries every default.
pub fn resolve(
  default_config_path: &Path,
  material_id: Option<&str>,
  materials_dir: &Path,
  overrides: &Overrides,
) -> Result<ResolvedConfig, ConfigError> {
  let mut merged = load_yaml_file(default_config_path)?;

  let mut sources = Map::new();
  sources.insert(
    "default".to_string(),
    Value::String(default_config_path.display().to_string()),
  );

  if let Some(material_id) = material_id {
    let material_path: PathBuf = materials_dir.join(format!("{material_id}.yaml"));
    if !material_path.is_file() {
      return Err(ConfigError::MaterialNotFound {
        material_id: material_id.to_string(),
        path: material_path,
      });
    }
    let material_raw = load_yaml_file(&material_path)?;
    merged = deep_merge(&merged, &material_raw);
    sources.insert(
      "material".to_string(),
      Value::String(material_path.display().to_string()),
    );
  }

  let mut applied = Map::new();
  if let Some(runs_dir) = &overrides.runs_dir {
    set_nested(&mut merged, &["run", "runs_dir"], Value::String(runs_dir.clone()));
    applied.insert("run.runs_dir".to_string(), Value::String(runs_dir.clone()));
  }
  if let Some(run_name) = &overrides.run_name {
    set_nested(&mut merged, &["run", "run_name"], Value::String(run_name.clone()));
    applied.insert("run.run_name".to_string(), Value::String(run_name.clone()));
  }
  if let Some(structure_path) = &overrides.structure_path {
    set_nested(
      &mut merged,
      &["structure", "path"],
      Value::String(structure_path.clone()),
    );
    applied.insert(
      "structure.path".to_string(),
      Value::String(structure_path.clone()),
    );
  }
  if !applied.is_empty() {
    sources.insert("overrides".to_string(), Value::Object(applied));
  }

  let config: RootConfig =
    serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::Validation {
      message: e.to_string(),
    })?;
  config.check_ranges()?;

  let resolved = serde_json::to_value(&config).map_err(|e| ConfigError::Validation {
    message: e.to_string(),
  })?;

  Ok(ResolvedConfig {
    config,
    resolved,
    sources: Value::Object(sources),
  })
}
