//! Downstream package emission: UPM (npm) and NuGet.
//!
//! Version stamping is delegated to the packager's own versioning command
//! before pack/publish. Local pack moves the produced archive into the
//! requested output directory; publish pushes to the configured feed,
//! optionally as a dry run that validates without transmitting.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use thiserror::Error;

use crate::config::PluginVariant;
use crate::runner::{Invocation, ProcessOutput, ProcessRunner};

/// The external packager exited non-zero. Captured output is surfaced
/// verbatim.
#[derive(Debug, Error)]
#[error("packager '{program}' failed (exit {code})\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
pub struct PackageFailure {
    pub program: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One packaging request. Never persisted.
#[derive(Debug, Clone)]
pub struct PackageDescriptor<'a> {
    pub variant: &'a PluginVariant,
    pub version: String,
    pub output_dir: PathBuf,
    pub publish: bool,
    pub dry_run: bool,
}

/// Emit a UPM package for one staged variant.
///
/// Local pack returns the archive's final path; publish returns `None`
/// (nothing lands on disk).
pub fn emit_upm(
    runner: &dyn ProcessRunner,
    repo_root: &Path,
    descriptor: &PackageDescriptor<'_>,
) -> Result<Option<PathBuf>> {
    if descriptor.dry_run && !descriptor.publish {
        bail!("dry-run only applies to publish mode");
    }

    let asset_dir = repo_root.join(descriptor.variant.asset_dir());

    // Stamp the package version before packing or publishing.
    run_packager(
        runner,
        Invocation::new("npm")
            .arg("version")
            .arg(descriptor.version.as_str())
            .arg("--allow-same-version")
            .cwd(&asset_dir),
    )?;

    if descriptor.publish {
        let mut invocation = Invocation::new("npm").arg("publish").cwd(&asset_dir);
        if descriptor.dry_run {
            invocation = invocation.arg("--dry-run");
        }
        run_packager(runner, invocation)?;
        println!(
            "[package:{}] {}",
            descriptor.variant.key,
            if descriptor.dry_run {
                "publish validated (dry run, nothing pushed)"
            } else {
                "published"
            }
        );
        return Ok(None);
    }

    run_packager(runner, Invocation::new("npm").arg("pack").cwd(&asset_dir))?;

    let archive_name = format!(
        "{}-{}.tgz",
        descriptor.variant.package_name, descriptor.version
    );
    let produced = asset_dir.join(&archive_name);
    fs::create_dir_all(&descriptor.output_dir).with_context(|| {
        format!(
            "creating package output directory '{}'",
            descriptor.output_dir.display()
        )
    })?;
    let destination = descriptor.output_dir.join(&archive_name);
    move_file(&produced, &destination)?;
    println!(
        "[package:{}] package generated: {}",
        descriptor.variant.key,
        destination.display()
    );
    Ok(Some(destination))
}

/// Publish an already-built archive, bypassing stage/version/pack.
pub fn publish_archive(runner: &dyn ProcessRunner, archive: &Path, dry_run: bool) -> Result<()> {
    if !archive.is_file() {
        bail!("package archive '{}' does not exist", archive.display());
    }
    let mut invocation = Invocation::new("npm")
        .arg("publish")
        .arg(archive.display().to_string());
    if dry_run {
        invocation = invocation.arg("--dry-run");
    }
    run_packager(runner, invocation)?;
    Ok(())
}

/// Emit a NuGet package from the variant's nuspec.
pub fn emit_nuget(
    runner: &dyn ProcessRunner,
    repo_root: &Path,
    descriptor: &PackageDescriptor<'_>,
) -> Result<PathBuf> {
    let asset_dir = repo_root.join(descriptor.variant.asset_dir());
    let nuspec = asset_dir.join(format!("{}.nuspec", descriptor.variant.plugin_name));
    fs::create_dir_all(&descriptor.output_dir).with_context(|| {
        format!(
            "creating package output directory '{}'",
            descriptor.output_dir.display()
        )
    })?;

    run_packager(
        runner,
        Invocation::new("nuget")
            .arg("pack")
            .arg(nuspec.display().to_string())
            .arg("-OutputDirectory")
            .arg(descriptor.output_dir.display().to_string())
            .arg("-Exclude")
            .arg("*.nuspec.meta")
            .arg("-Version")
            .arg(descriptor.version.as_str()),
    )?;

    let package_path = descriptor.output_dir.join(format!(
        "{}.{}.nupkg",
        descriptor.variant.plugin_name, descriptor.version
    ));
    println!(
        "[package:{}] package generated: {}",
        descriptor.variant.key,
        package_path.display()
    );
    Ok(package_path)
}

/// Export a .unitypackage by driving the Unity editor headless.
///
/// Unity is never on PATH; the caller names the editor directory and the
/// executable must exist before anything runs. The export covers the
/// whole `Assets` tree of the variant's project.
pub fn emit_unity(
    runner: &dyn ProcessRunner,
    repo_root: &Path,
    descriptor: &PackageDescriptor<'_>,
    unity_dir: &Path,
) -> Result<PathBuf> {
    let editor = unity_dir.join("Unity.exe");
    if !editor.is_file() {
        bail!("no Unity editor at '{}'", editor.display());
    }

    let project_dir = repo_root.join(&descriptor.variant.project_dir);
    fs::create_dir_all(&descriptor.output_dir).with_context(|| {
        format!(
            "creating package output directory '{}'",
            descriptor.output_dir.display()
        )
    })?;
    let package_path = descriptor.output_dir.join(format!(
        "{}.{}.unitypackage",
        descriptor.variant.plugin_name, descriptor.version
    ));

    run_packager(
        runner,
        Invocation::new(&editor.display().to_string())
            .arg("-BatchMode")
            .arg("-Quit")
            .arg("-ProjectPath")
            .arg(project_dir.display().to_string())
            .arg("-ExportPackage")
            .arg("Assets")
            .arg(package_path.display().to_string()),
    )?;

    println!(
        "[package:{}] package generated: {}",
        descriptor.variant.key,
        package_path.display()
    );
    Ok(package_path)
}

fn run_packager(runner: &dyn ProcessRunner, invocation: Invocation) -> Result<ProcessOutput> {
    let program = invocation.program.clone();
    let output = runner
        .run(&invocation)
        .with_context(|| format!("running `{}`", invocation))?;
    if !output.success() {
        return Err(PackageFailure {
            program,
            code: output.exit_code(),
            stdout: output.stdout.trim().to_string(),
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(output)
}

/// Rename with a copy+remove fallback for cross-filesystem moves.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "moving '{}' to '{}'",
            source.display(),
            destination.display()
        )
    })?;
    fs::remove_file(source)
        .with_context(|| format!("removing intermediate '{}'", source.display()))?;
    Ok(())
}
