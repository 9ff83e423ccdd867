//! Preflight checks for host toolchain validation.
//!
//! Validates that the required external tools are on PATH before any
//! build, restore, or packaging work starts. This prevents cryptic
//! mid-matrix failures after some targets have already built.

use anyhow::{bail, Result};

use crate::matrix::BuildTarget;

/// Check if a command exists on the host system.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Tools needed for any build run: the generator and the dependency
/// restorer. Each tuple is (command_name, install_hint).
pub const GENERATOR_TOOLS: &[(&str, &str)] = &[
    ("cmake", "CMake"),
    ("nuget", "NuGet CLI"),
];

/// Additional tools for Windows-family compiles.
pub const MSBUILD_TOOLS: &[(&str, &str)] = &[("msbuild", "Visual Studio Build Tools")];

/// Tools for UPM packaging.
pub const NPM_TOOLS: &[(&str, &str)] = &[("npm", "Node.js / npm")];

/// Tools for NuGet packaging.
pub const NUGET_TOOLS: &[(&str, &str)] = &[("nuget", "NuGet CLI")];

/// Check that specific tools are available.
///
/// Returns `Err` listing every missing tool with its install hint.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, hint) in tools {
        if !command_exists(tool) {
            missing.push((*tool, *hint));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, h)| format!("  {} (install: {})", t, h))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check every tool the expanded matrix will need.
pub fn check_build_tools(targets: &[BuildTarget]) -> Result<()> {
    let mut tools: Vec<(&str, &str)> = GENERATOR_TOOLS.to_vec();
    if targets.iter().any(|t| t.platform.is_windows_family()) {
        tools.extend_from_slice(MSBUILD_TOOLS);
    }
    check_required_tools(&tools)
}
