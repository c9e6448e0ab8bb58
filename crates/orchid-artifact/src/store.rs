//! Filesystem artifact store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use orchid_identity::RunIdentity;

use crate::log::LogEntry;
use crate::manifest::Manifest;
use crate::ArtifactError;

/// Creates and hands out run directories under a common runs root.
pub struct ArtifactStore {
  runs_dir: PathBuf,
}

impl ArtifactStore {
  /// Create a store rooted at `runs_dir`. The root is created lazily.
  pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
    Self {
      runs_dir: runs_dir.into(),
    }
  }

  pub fn runs_dir(&self) -> &Path {
    &self.runs_dir
  }

  /// Create the run directory for `identity`, exactly once.
  ///
  /// Directory creation is atomic, so concurrent attempts with the same
  /// identity leave at most one winner; the loser gets `AlreadyExists`.
  /// A directory that exists but is empty is adopted (nothing ever ran
  /// in it). `input/` and `results/` are created as part of init.
  pub async fn init(&self, identity: &RunIdentity) -> Result<RunHandle, ArtifactError> {
    fs::create_dir_all(&self.runs_dir).await?;

    let run_dir = self.runs_dir.join(identity.run_id());
    match fs::create_dir(&run_dir).await {
      Ok(()) => {}
      Err(e) if e.kind() == ErrorKind::AlreadyExists => {
        let mut entries = fs::read_dir(&run_dir).await?;
        if entries.next_entry().await?.is_some() {
          return Err(ArtifactError::AlreadyExists(run_dir));
        }
      }
      Err(e) => return Err(e.into()),
    }

    fs::create_dir_all(run_dir.join("input")).await?;
    fs::create_dir_all(run_dir.join("results")).await?;

    Ok(RunHandle { run_dir })
  }
}

/// Write access to one run's directory.
///
/// All side effects of a run are confined to this subtree.
#[derive(Debug)]
pub struct RunHandle {
  run_dir: PathBuf,
}

impl RunHandle {
  pub fn run_dir(&self) -> &Path {
    &self.run_dir
  }

  pub fn manifest_path(&self) -> PathBuf {
    self.run_dir.join("manifest.json")
  }

  pub fn log_path(&self) -> PathBuf {
    self.run_dir.join("logs.jsonl")
  }

  pub fn results_dir(&self) -> PathBuf {
    self.run_dir.join("results")
  }

  /// Copy the structure input into `input/`, preserving its extension.
  ///
  /// Fails with `AlreadyExists` if an input was already copied.
  pub async fn copy_input(&self, source: &Path) -> Result<PathBuf, ArtifactError> {
    if !fs::try_exists(source).await? {
      return Err(ArtifactError::InputNotFound(source.to_path_buf()));
    }

    let file_name = match source.extension() {
      Some(ext) => format!("structure.{}", ext.to_string_lossy()),
      None => "structure".to_string(),
    };
    let dest = self.run_dir.join("input").join(file_name);

    if fs::try_exists(&dest).await? {
      return Err(ArtifactError::AlreadyExists(dest));
    }

    fs::copy(source, &dest).await?;
    Ok(dest)
  }

  /// Append one structured entry to `logs.jsonl`.
  ///
  /// The entire line (including the trailing newline) goes through a
  /// single `write_all` followed by a flush, so a crash immediately after
  /// this call still leaves a complete, parseable line.
  pub async fn append_log(&self, entry: &LogEntry) -> Result<(), ArtifactError> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(self.log_path())
      .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
  }

  /// Replace `manifest.json` atomically (write to a temp file, rename).
  pub async fn write_manifest(&self, manifest: &Manifest) -> Result<(), ArtifactError> {
    let mut payload = serde_json::to_string_pretty(manifest)?;
    payload.push('\n');

    let tmp = self.run_dir.join("manifest.json.tmp");
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, self.manifest_path()).await?;
    Ok(())
  }

  /// Write `results/summary.json` and `results/report.md`.
  ///
  /// Results mark termination and are written exactly once; a second call
  /// fails with `AlreadyExists`.
  pub async fn write_results(&self, summary: &Value, report: &str) -> Result<(), ArtifactError> {
    let results_dir = self.results_dir();
    let summary_path = results_dir.join("summary.json");
    if fs::try_exists(&summary_path).await? {
      return Err(ArtifactError::AlreadyExists(summary_path));
    }

    let mut payload = serde_json::to_string_pretty(summary)?;
    payload.push('\n');

    let tmp = results_dir.join("summary.json.tmp");
    fs::write(&tmp, payload).await?;
    fs::rename(&tmp, &summary_path).await?;

    fs::write(results_dir.join("report.md"), report).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;
  use serde_json::json;

  use crate::log::LogEvent;
  use crate::manifest::RunStatus;

  use super::*;

  fn test_identity() -> RunIdentity {
    let ts = Utc.with_ymd_and_hms(2024, 6, 7, 8, 9, 10).unwrap();
    RunIdentity::derive("si_bulk", &json!({ "k": 1 }), ts, None, Some("unit")).expect("derive")
  }

  #[tokio::test]
  async fn test_init_creates_layout_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path().join("runs"));
    let identity = test_identity();

    let handle = store.init(&identity).await.expect("first init");
    assert!(handle.run_dir().join("input").is_dir());
    assert!(handle.run_dir().join("results").is_dir());

    let err = store.init(&identity).await.expect_err("second init must fail");
    assert!(matches!(err, ArtifactError::AlreadyExists(_)));
  }

  #[tokio::test]
  async fn test_copy_input_preserves_extension_and_refuses_overwrite() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let source = tmp.path().join("h2.xyz");
    std::fs::write(&source, "2\n\nH 0 0 0\nH 0 0 0.74\n").expect("write");

    let store = ArtifactStore::new(tmp.path().join("runs"));
    let handle = store.init(&test_identity()).await.expect("init");

    let dest = handle.copy_input(&source).await.expect("copy");
    assert_eq!(dest.file_name().unwrap(), "structure.xyz");

    let err = handle.copy_input(&source).await.expect_err("second copy");
    assert!(matches!(err, ArtifactError::AlreadyExists(_)));
  }

  #[tokio::test]
  async fn test_append_log_lines_are_independent() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path().join("runs"));
    let handle = store.init(&test_identity()).await.expect("init");

    handle
      .append_log(&LogEntry::new("a", LogEvent::Start))
      .await
      .expect("append");
    handle
      .append_log(&LogEntry::new("a", LogEvent::End).attempt(1))
      .await
      .expect("append");

    let text = std::fs::read_to_string(handle.log_path()).expect("read log");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
      let _: LogEntry = serde_json::from_str(line).expect("each line parses");
    }
  }

  #[tokio::test]
  async fn test_manifest_replace_leaves_no_tmp_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path().join("runs"));
    let identity = test_identity();
    let handle = store.init(&identity).await.expect("init");

    let manifest = Manifest::new(&identity, json!({ "k": 1 }));
    handle.write_manifest(&manifest).await.expect("write");
    handle.write_manifest(&manifest).await.expect("rewrite");

    assert!(handle.manifest_path().is_file());
    assert!(!handle.run_dir().join("manifest.json.tmp").exists());

    let back: Manifest =
      serde_json::from_str(&std::fs::read_to_string(handle.manifest_path()).unwrap())
        .expect("manifest parses");
    assert_eq!(back.status, RunStatus::Running);
  }

  #[tokio::test]
  async fn test_results_written_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = ArtifactStore::new(tmp.path().join("runs"));
    let handle = store.init(&test_identity()).await.expect("init");

    handle
      .write_results(&json!({ "status": "succeeded" }), "# report\n")
      .await
      .expect("first write");

    let err = handle
      .write_results(&json!({ "status": "succeeded" }), "# report\n")
      .await
      .expect_err("second write must fail");
    assert!(matches!(err, ArtifactError::AlreadyExists(_)));
  }
}
