//! Run and stage manifests.
//!
//! Every pipeline run records what happened per target in
//! `run-manifest.json` under the build root; every staging pass records
//! what landed where (with content digests) in `stage-manifest.json`.
//! Manifests are written even when targets failed, so a partial run is
//! inspectable and resumable.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::stage::StageReport;

pub const RUN_MANIFEST_FILENAME: &str = "run-manifest.json";
pub const STAGE_MANIFEST_FILENAME: &str = "stage-manifest.json";

/// Outcome of one target in a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TargetStatus {
    Success,
    Failed { exit_code: i32 },
    /// Not started: an earlier failure aborted the run, or it was cancelled.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: String,
    #[serde(flatten)]
    pub status: TargetStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub targets: Vec<TargetOutcome>,
}

impl RunManifest {
    pub fn failed_targets(&self) -> Vec<&TargetOutcome> {
        self.targets
            .iter()
            .filter(|outcome| matches!(outcome.status, TargetStatus::Failed { .. }))
            .collect()
    }
}

/// Current time as an RFC3339 UTC timestamp.
pub fn now_utc() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("formatting UTC timestamp")
}

pub fn run_manifest_path(repo_root: &Path, build_root: &str) -> PathBuf {
    repo_root.join(build_root).join(RUN_MANIFEST_FILENAME)
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(manifest).context("serializing run manifest")?;
    fs::write(path, json).with_context(|| format!("writing run manifest '{}'", path.display()))?;
    Ok(())
}

/// Write the staging manifest for one staging pass (all variants).
pub fn write_stage_manifest(path: &Path, reports: &[StageReport]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(reports).context("serializing stage manifest")?;
    fs::write(path, json)
        .with_context(|| format!("writing stage manifest '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn load_run_manifest(path: &Path) -> RunManifest {
        serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn run_manifest_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = run_manifest_path(temp.path(), "build");
        let manifest = RunManifest {
            started_at_utc: now_utc().unwrap(),
            finished_at_utc: now_utc().unwrap(),
            targets: vec![
                TargetOutcome {
                    target: "windows/x64/relwithdebinfo".to_string(),
                    status: TargetStatus::Success,
                },
                TargetOutcome {
                    target: "android/x86/debug".to_string(),
                    status: TargetStatus::Failed { exit_code: 2 },
                },
            ],
        };

        write_run_manifest(&path, &manifest).unwrap();
        let loaded = load_run_manifest(&path);
        assert_eq!(loaded.targets.len(), 2);
        assert_eq!(loaded.targets[1].status, TargetStatus::Failed { exit_code: 2 });
        assert_eq!(loaded.failed_targets().len(), 1);
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let stamp = now_utc().unwrap();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z') || stamp.contains('+'));
    }
}
