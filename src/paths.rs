//! Canonical filesystem locations for build, output, and package trees.
//!
//! Pure mappings from (repo root, target) to paths; nothing here touches
//! the filesystem except [`locate_repo_root`], which queries git through
//! the process runner and falls back to the current directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::matrix::{BuildTarget, Configuration, Platform};
use crate::runner::{Invocation, ProcessRunner};

/// Build directory for one target.
///
/// Visual Studio generators are multi-config, so the Windows family keys
/// build directories by (platform, architecture) only. Android's makefile
/// generator bakes the configuration in at generation time, so debug
/// builds get their own `<arch>-Debug` directory.
pub fn build_dir(repo_root: &Path, settings: &Settings, target: &BuildTarget) -> PathBuf {
    let arch_dir = match (target.platform, target.configuration) {
        (Platform::Android, Configuration::Debug) => {
            format!("{}-Debug", target.architecture)
        }
        _ => target.architecture.to_string(),
    };
    repo_root
        .join(&settings.build_root)
        .join(target.platform.dir_name())
        .join(arch_dir)
}

/// Directory compiled binaries land in for one target.
pub fn output_dir(repo_root: &Path, settings: &Settings, target: &BuildTarget) -> PathBuf {
    let build = build_dir(repo_root, settings, target);
    if target.platform.is_windows_family() {
        build.join("bin").join(target.configuration.as_str())
    } else {
        build.join("bin")
    }
}

/// Stable folder token for one target inside an external artifacts drop.
pub fn drop_dir_name(target: &BuildTarget) -> String {
    format!(
        "{}_{}_{}",
        target.platform.dir_name(),
        target.architecture.as_str().to_ascii_lowercase(),
        target.configuration
    )
}

/// Source directory for one target inside an external artifacts drop.
pub fn drop_source_dir(drop_root: &Path, target: &BuildTarget) -> PathBuf {
    drop_root.join(drop_dir_name(target))
}

/// Default output directory for npm package archives.
pub fn npm_output_dir(repo_root: &Path, settings: &Settings) -> PathBuf {
    repo_root.join(&settings.build_root).join("npm")
}

/// Default output directory for NuGet packages.
pub fn nuget_output_dir(repo_root: &Path, settings: &Settings) -> PathBuf {
    repo_root.join(&settings.build_root).join("nuget")
}

/// Default output directory for exported .unitypackage archives.
pub fn unity_output_dir(repo_root: &Path, settings: &Settings) -> PathBuf {
    repo_root.join(&settings.build_root).join("unity")
}

/// Resolve the repository root.
///
/// Asks `git rev-parse --show-toplevel`; when the command fails (not a git
/// checkout, git missing) the current directory is used instead.
pub fn locate_repo_root(runner: &dyn ProcessRunner) -> Result<PathBuf> {
    let invocation = Invocation::new("git").args(["rev-parse", "--show-toplevel"]);
    if let Ok(output) = runner.run(&invocation) {
        if output.success() {
            let root = output.stdout.trim();
            if !root.is_empty() {
                return Ok(PathBuf::from(root));
            }
        }
    }
    std::env::current_dir().context("resolving current directory as repo root")
}
