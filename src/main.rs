use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use orchid_artifact::{ArtifactStore, RunStatus};
use orchid_config::{Overrides, resolve};
use orchid_executor::{Executor, RunRequest};
use orchid_identity::git_short_sha;
use orchid_pipeline::{initial_state, standard_graph};

/// Orchid - deterministic workflow runs for DFT-style pipelines
#[derive(Parser)]
#[command(name = "orchid")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the standard pipeline for a material
  Run {
    /// Path to the default config YAML
    #[arg(long, default_value = "configs/default.yaml")]
    config: PathBuf,

    /// Material id (loads configs/materials/<id>.yaml)
    #[arg(long)]
    material: String,

    /// Override the structure input path
    #[arg(long)]
    structure: Option<String>,

    /// Override the runs output directory
    #[arg(long)]
    runs_dir: Option<String>,

    /// Optional run label (included in the run directory name)
    #[arg(long)]
    run_name: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match cli.command {
    Commands::Run {
      config,
      material,
      structure,
      runs_dir,
      run_name,
    } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(cmd_run(config, material, structure, runs_dir, run_name))
    }
  }
}

async fn cmd_run(
  config_path: PathBuf,
  material: String,
  structure: Option<String>,
  runs_dir: Option<String>,
  run_name: Option<String>,
) -> Result<()> {
  let overrides = Overrides {
    runs_dir,
    structure_path: structure,
    run_name,
  };
  let materials_dir = config_path
    .parent()
    .map(|p| p.join("materials"))
    .unwrap_or_else(|| PathBuf::from("materials"));

  let resolved = resolve(&config_path, Some(&material), &materials_dir, &overrides)
    .with_context(|| format!("failed to resolve config from {}", config_path.display()))?;

  let project_root = infer_project_root(&config_path);
  let runs_dir = resolve_maybe_relative(&resolved.config.run.runs_dir, &project_root);

  // The structure input is optional; a configured-but-missing path is
  // skipped with a warning, matching the run's best-effort provenance.
  let structure_path = resolved.config.structure.path.as_ref().and_then(|p| {
    let path = resolve_maybe_relative(p, &project_root);
    if path.is_file() {
      Some(path)
    } else {
      eprintln!(
        "warning: structure path does not exist, skipping copy: {}",
        path.display()
      );
      None
    }
  });

  let graph = standard_graph().context("failed to build pipeline graph")?;

  let mut request = RunRequest::new(&material, resolved.resolved.clone(), Utc::now());
  request.structure_path = structure_path;
  request.run_name = resolved.config.run.run_name.clone();
  request.revision = git_short_sha(&project_root);
  request.initial_state = initial_state(&resolved.config);

  let executor = Executor::new(ArtifactStore::new(runs_dir));
  let outcome = executor
    .run(&graph, request, CancellationToken::new())
    .await
    .context("workflow execution failed")?;

  println!("run_dir: {}", outcome.run_dir.display());
  println!("status: {}", status_str(outcome.status));
  if let Some(summary) = &outcome.summary {
    if let Some(passed) = summary["validation"]["passed"].as_bool() {
      println!("passed: {passed}");
    }
    if let Some(energy) = summary["calculation"]["energy_ev"].as_f64() {
      println!("energy_ev: {energy}");
    }
    if let Some(max_force) = summary["validation"]["max_force"].as_f64() {
      println!("max_force: {max_force}");
    }
  }

  if outcome.status == RunStatus::Failed {
    std::process::exit(1);
  }
  Ok(())
}

fn status_str(status: RunStatus) -> &'static str {
  match status {
    RunStatus::Running => "running",
    RunStatus::Succeeded => "succeeded",
    RunStatus::Failed => "failed",
    RunStatus::Cancelled => "cancelled",
  }
}

/// Common case: `<root>/configs/default.yaml` -> `<root>`.
fn infer_project_root(config_path: &Path) -> PathBuf {
  match config_path.parent() {
    Some(parent) if parent.file_name().is_some_and(|n| n == "configs") => parent
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| PathBuf::from(".")),
    _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
  }
}

fn resolve_maybe_relative(path: &str, project_root: &Path) -> PathBuf {
  let path = PathBuf::from(path);
  if path.is_absolute() {
    path
  } else {
    project_root.join(path)
  }
}
