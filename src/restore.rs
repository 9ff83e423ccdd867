//! Restore of externally-sourced native packages.
//!
//! Runs once per pipeline invocation, before any target builds. The
//! shared external directory is written here and read-only for the rest
//! of the run; an advisory lock keeps two concurrent restores from
//! interleaving. Failure aborts the whole run; building against a stale
//! dependency set is never attempted.

use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;
use thiserror::Error;

use crate::config::Settings;
use crate::runner::{Invocation, ProcessRunner};

const RESTORE_LOCK_FILENAME: &str = ".restore.lock";

/// The external package fetch returned non-zero.
#[derive(Debug, Error)]
#[error("dependency restore failed (exit {code}): {stderr}")]
pub struct RestoreFailure {
    pub code: i32,
    pub stderr: String,
}

/// Fetch the declared native packages into the shared external directory.
///
/// Blocking: returns only once every package is present or the restore
/// has failed.
pub fn restore(runner: &dyn ProcessRunner, settings: &Settings, repo_root: &Path) -> Result<()> {
    let external = repo_root.join(&settings.external_dir);
    fs::create_dir_all(&external)
        .with_context(|| format!("creating external directory '{}'", external.display()))?;

    let lock_path = external.join(RESTORE_LOCK_FILENAME);
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("opening restore lock '{}'", lock_path.display()))?;
    lock_file
        .lock_exclusive()
        .with_context(|| format!("locking restore lock '{}'", lock_path.display()))?;

    println!("[restore] restoring native packages into '{}'", external.display());

    let invocation = Invocation::new("nuget")
        .arg("restore")
        .arg(repo_root.join(&settings.packages_config).display().to_string())
        .arg("-PackagesDirectory")
        .arg(external.display().to_string())
        .arg("-ConfigFile")
        .arg(repo_root.join(&settings.nuget_config).display().to_string())
        .cwd(repo_root);

    let output = runner
        .run(&invocation)
        .context("running nuget restore")?;

    // Release before surfacing the result either way.
    let _ = lock_file.unlock();

    if !output.success() {
        return Err(RestoreFailure {
            code: output.exit_code(),
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }

    println!("[restore] done");
    Ok(())
}
