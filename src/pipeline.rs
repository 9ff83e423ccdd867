//! Build orchestration over the expanded matrix.
//!
//! Targets run one at a time in matrix order. The dependency restore runs
//! exactly once, before the first target. The default failure policy is
//! continue-and-aggregate: one bad target does not hide the others, and
//! every outcome lands in the run manifest. `fail_fast` flips that to
//! abort-on-first (remaining targets are recorded as skipped).
//!
//! Cancellation is checked between targets only; an in-flight generator or
//! compiler invocation is never killed.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::Settings;
use crate::matrix::BuildTarget;
use crate::paths;
use crate::report::{self, RunManifest, TargetOutcome, TargetStatus};
use crate::restore;
use crate::runner::ProcessRunner;
use crate::toolchain::{self, BuildOptions};

/// One target's toolchain invocation returned non-zero.
#[derive(Debug, Error)]
#[error("build failed for {target} during {step} (exit {code})")]
pub struct BuildFailure {
    pub target: String,
    pub step: &'static str,
    pub code: i32,
}

/// Generate and compile one target.
///
/// Creates the build directory if absent (idempotent), runs generation
/// with the build directory as working directory and the repo root as the
/// source tree, then runs the platform's compile step. Only the build
/// directory is mutated. No automatic retry; retrying is caller policy.
pub fn build_target(
    runner: &dyn ProcessRunner,
    settings: &Settings,
    repo_root: &Path,
    target: &BuildTarget,
    opts: &BuildOptions,
) -> Result<()> {
    let profile = toolchain::profile(settings, target)?;
    let build_dir = paths::build_dir(repo_root, settings, target);
    fs::create_dir_all(&build_dir)
        .with_context(|| format!("creating build directory '{}'", build_dir.display()))?;

    let generate = toolchain::generate_invocation(repo_root, &build_dir, &profile, opts);
    println!("[build:{target}] executing: {generate}");
    let output = runner
        .run(&generate)
        .with_context(|| format!("generating {target}"))?;
    if !output.success() {
        report_tool_output(&output.stdout, &output.stderr);
        return Err(BuildFailure {
            target: target.to_string(),
            step: "generate",
            code: output.exit_code(),
        }
        .into());
    }

    let compile = toolchain::compile_invocation(settings, &build_dir, target, &profile, opts.clean);
    println!("[build:{target}] executing: {compile}");
    let output = runner
        .run(&compile)
        .with_context(|| format!("compiling {target}"))?;
    if !output.success() {
        report_tool_output(&output.stdout, &output.stderr);
        return Err(BuildFailure {
            target: target.to_string(),
            step: "compile",
            code: output.exit_code(),
        }
        .into());
    }

    Ok(())
}

/// Run the whole matrix: restore once, then build each target in order.
///
/// Returns the run manifest (also written under the build root). Errors
/// that are not per-target build failures (a failed restore, a
/// misconfigured toolchain) abort immediately, since they would fail
/// every remaining target the same way.
pub fn run_matrix(
    runner: &dyn ProcessRunner,
    settings: &Settings,
    repo_root: &Path,
    targets: &[BuildTarget],
    opts: &BuildOptions,
    fail_fast: bool,
    cancel: &AtomicBool,
) -> Result<RunManifest> {
    restore::restore(runner, settings, repo_root)?;

    let started_at_utc = report::now_utc()?;
    let mut outcomes = Vec::with_capacity(targets.len());
    let mut aborted = false;

    for target in targets {
        if cancel.load(Ordering::Relaxed) {
            println!("[build:{target}] cancelled; not starting");
            outcomes.push(TargetOutcome {
                target: target.to_string(),
                status: TargetStatus::Skipped,
            });
            continue;
        }
        if aborted {
            outcomes.push(TargetOutcome {
                target: target.to_string(),
                status: TargetStatus::Skipped,
            });
            continue;
        }

        match build_target(runner, settings, repo_root, target, opts) {
            Ok(()) => outcomes.push(TargetOutcome {
                target: target.to_string(),
                status: TargetStatus::Success,
            }),
            Err(err) => match err.downcast_ref::<BuildFailure>() {
                Some(failure) => {
                    eprintln!("[build:{target}] {failure}");
                    outcomes.push(TargetOutcome {
                        target: target.to_string(),
                        status: TargetStatus::Failed {
                            exit_code: failure.code,
                        },
                    });
                    if fail_fast {
                        aborted = true;
                    }
                }
                None => return Err(err),
            },
        }
    }

    let manifest = RunManifest {
        started_at_utc,
        finished_at_utc: report::now_utc()?,
        targets: outcomes,
    };
    let manifest_path = report::run_manifest_path(repo_root, &settings.build_root);
    report::write_run_manifest(&manifest_path, &manifest)?;

    let failed = manifest.failed_targets();
    if failed.is_empty() {
        println!("[build] {} target(s) succeeded", manifest.targets.len());
    } else {
        for outcome in &failed {
            eprintln!("[build] failed: {}", outcome.target);
        }
    }
    Ok(manifest)
}

fn report_tool_output(stdout: &str, stderr: &str) {
    if !stdout.trim().is_empty() {
        eprintln!("{}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        eprintln!("{}", stderr.trim());
    }
}
