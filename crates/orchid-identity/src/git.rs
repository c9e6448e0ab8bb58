//! Best-effort source-control revision lookup.

use std::path::Path;
use std::process::Command;

/// Short commit SHA of `HEAD` in `cwd`, or `None` when git is unavailable,
/// the directory is not a repository, or the command fails for any reason.
pub fn git_short_sha(cwd: &Path) -> Option<String> {
  let output = Command::new("git")
    .arg("-C")
    .arg(cwd)
    .args(["rev-parse", "--short", "HEAD"])
    .output()
    .ok()?;

  if !output.status.success() {
    return None;
  }

  let sha = String::from_utf8(output.stdout).ok()?.trim().to_string();
  if sha.is_empty() { None } else { Some(sha) }
}
