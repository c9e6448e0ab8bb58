//! Typed configuration model.
//!
//! Every section rejects unknown keys so a typo in an overlay fails loudly
//! at resolution time instead of silently falling back to a default.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// SCF solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScfConfig {
  pub conv_tol: f64,
  pub max_cycle: u32,
}

impl Default for ScfConfig {
  fn default() -> Self {
    Self {
      conv_tol: 1e-8,
      max_cycle: 50,
    }
  }
}

/// Periodic-boundary-condition settings.
///
/// `enabled: None` means auto: use PBC when the structure indicates
/// periodicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PbcConfig {
  pub enabled: Option<bool>,
  pub basis: String,
  pub pseudo: Option<String>,
  pub mesh: Vec<u32>,
  pub kpts: Vec<u32>,
  pub use_multigrid: bool,
}

impl Default for PbcConfig {
  fn default() -> Self {
    Self {
      enabled: None,
      basis: "gth-szv-molopt-sr".to_string(),
      pseudo: Some("gth-pbe".to_string()),
      mesh: vec![25, 25, 25],
      kpts: vec![1, 1, 1],
      use_multigrid: true,
    }
  }
}

/// Energy/force backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CalculatorConfig {
  pub backend: String,
  pub method: String,
  pub xc: String,
  pub basis: String,
  pub charge: i32,
  pub spin: u32,
  pub scf: ScfConfig,
  pub pbc: PbcConfig,
}

impl Default for CalculatorConfig {
  fn default() -> Self {
    Self {
      backend: "pyscf".to_string(),
      method: "dft".to_string(),
      xc: "PBE".to_string(),
      basis: "def2-svp".to_string(),
      charge: 0,
      spin: 0,
      scf: ScfConfig::default(),
      pbc: PbcConfig::default(),
    }
  }
}

/// Run bookkeeping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
  pub runs_dir: String,
  pub precision_digits: u32,
  pub run_name: Option<String>,
  pub retries: u32,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      runs_dir: "runs".to_string(),
      precision_digits: 8,
      run_name: None,
      retries: 1,
    }
  }
}

/// Structure input reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StructureConfig {
  pub path: Option<String>,
}

/// Geometry relaxation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RelaxConfig {
  pub enabled: bool,
  pub optimizer: String,
  pub fmax: f64,
  pub steps: u32,
}

impl Default for RelaxConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      optimizer: "BFGS".to_string(),
      fmax: 0.05,
      steps: 200,
    }
  }
}

/// Result validation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ValidationConfig {
  pub require_scf_converged: bool,
  pub max_force: f64,
}

impl Default for ValidationConfig {
  fn default() -> Self {
    Self {
      require_scf_converged: true,
      max_force: 0.05,
    }
  }
}

/// Output toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputConfig {
  pub write_trajectory: bool,
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      write_trajectory: true,
    }
  }
}

/// The full run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RootConfig {
  pub run: RunConfig,
  pub structure: StructureConfig,
  pub calculator: CalculatorConfig,
  pub relax: RelaxConfig,
  pub validate: ValidationConfig,
  pub output: OutputConfig,
}

impl RootConfig {
  /// Range checks that serde cannot express.
  pub fn check_ranges(&self) -> Result<(), ConfigError> {
    fn fail(message: impl Into<String>) -> Result<(), ConfigError> {
      Err(ConfigError::Validation {
        message: message.into(),
      })
    }

    if self.calculator.scf.conv_tol <= 0.0 {
      return fail("calculator.scf.conv_tol must be > 0");
    }
    if self.calculator.scf.max_cycle < 1 {
      return fail("calculator.scf.max_cycle must be >= 1");
    }
    if self.run.precision_digits > 16 {
      return fail("run.precision_digits must be <= 16");
    }
    if self.run.retries > 2 {
      return fail("run.retries must be <= 2");
    }
    if self.relax.fmax <= 0.0 {
      return fail("relax.fmax must be > 0");
    }
    if self.validate.max_force <= 0.0 {
      return fail("validate.max_force must be > 0");
    }
    if self.calculator.pbc.mesh.len() != 3 {
      return fail("calculator.pbc.mesh must have exactly 3 entries");
    }
    if self.calculator.pbc.kpts.len() != 3 {
      return fail("calculator.pbc.kpts must have exactly 3 entries");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_pass_range_checks() {
    RootConfig::default().check_ranges().expect("defaults valid");
  }

  #[test]
  fn test_unknown_key_rejected() {
    let raw = serde_json::json!({ "run": { "runs_dirr": "oops" } });
    let parsed: Result<RootConfig, _> = serde_json::from_value(raw);
    assert!(parsed.is_err());
  }

  #[test]
  fn test_retries_out_of_range() {
    let cfg = RootConfig {
      run: RunConfig {
        retries: 3,
        ..RunConfig::default()
      },
      ..RootConfig::default()
    };
    assert!(cfg.check_ranges().is_err());
  }
}
