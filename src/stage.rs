//! Staging of compiled plugin binaries into Unity asset layouts.
//!
//! For every (platform, architecture) cell a variant supports, the stager
//! copies each declared binary component (plus its debug-symbol sidecar on
//! the Windows family) from a local build tree or an external artifacts
//! drop into
//! `<project>/Assets/<plugin>/Plugins/[<subfolder>/]<published-arch>/`.
//!
//! Copies are plain overwrites: re-running staging is safe and produces
//! byte-identical destinations. A missing source file fails its cell
//! immediately rather than silently shipping a stale binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{PluginVariant, Settings};
use crate::matrix::{Architecture, BuildTarget, Configuration, Platform};
use crate::paths;

/// Where staged binaries come from. The two forms are mutually exclusive
/// per staging invocation; the caller picks one.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Output subfolders of local build directories.
    LocalBuild { repo_root: PathBuf },
    /// An externally supplied artifacts directory with one
    /// `<platform>_<arch>_<config>` subfolder per target.
    Drop { root: PathBuf },
}

impl ArtifactSource {
    /// Source directory holding the binaries for one cell.
    pub fn source_dir(&self, settings: &Settings, target: &BuildTarget) -> PathBuf {
        match self {
            ArtifactSource::LocalBuild { repo_root } => {
                paths::output_dir(repo_root, settings, target)
            }
            ArtifactSource::Drop { root } => paths::drop_source_dir(root, target),
        }
    }
}

/// Staging failed for one cell.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("missing source binary '{}' for cell {cell}", .path.display())]
    MissingSource { cell: String, path: PathBuf },
    #[error("no published architecture name for {platform}/{architecture}")]
    UnpublishedArchitecture {
        platform: Platform,
        architecture: Architecture,
    },
}

/// One file landed by the stager, with its content digest.
#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    pub cell: String,
    pub component: String,
    pub destination: PathBuf,
    pub sha256: String,
}

/// Everything one `stage_variant` call copied.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub variant: String,
    pub configuration: String,
    pub files: Vec<StagedFile>,
}

/// Published architecture folder name for a matrix cell.
///
/// Table-driven and total over the supported matrix; `None` marks a
/// combination staging must refuse.
pub fn published_name(platform: Platform, architecture: Architecture) -> Option<&'static str> {
    match (platform, architecture) {
        (Platform::Windows | Platform::WindowsStore, Architecture::Win32) => Some("x86"),
        (Platform::Windows | Platform::WindowsStore, Architecture::X64) => Some("x86_64"),
        (Platform::WindowsStore, Architecture::Arm) => Some("ARM"),
        (Platform::WindowsStore, Architecture::Arm64) => Some("ARM64"),
        (Platform::Android, Architecture::X86) => Some("x86"),
        (Platform::Android, Architecture::ArmeabiV7a) => Some("armeabi-v7a"),
        (Platform::Android, Architecture::Arm64V8a) => Some("arm64-v8a"),
        _ => None,
    }
}

/// Platform subfolder under `Plugins/`, where the layout has one.
pub fn platform_subfolder(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::Windows => None,
        Platform::WindowsStore => Some("WSA"),
        Platform::Android => Some("Android"),
    }
}

/// Files one binary component contributes on a platform: dynamic library
/// plus symbol sidecar on the Windows family, shared object only on
/// Android.
pub fn component_files(component: &str, platform: Platform) -> Vec<String> {
    if platform.is_windows_family() {
        vec![format!("{component}.dll"), format!("{component}.pdb")]
    } else {
        vec![format!("lib{component}.so")]
    }
}

/// Destination directory for one (variant, platform, architecture) cell.
pub fn destination_dir(
    repo_root: &Path,
    variant: &PluginVariant,
    platform: Platform,
    architecture: Architecture,
) -> Result<PathBuf, StageFailure> {
    let published = published_name(platform, architecture).ok_or(
        StageFailure::UnpublishedArchitecture {
            platform,
            architecture,
        },
    )?;
    let mut dir = repo_root.join(variant.asset_dir()).join("Plugins");
    if let Some(subfolder) = platform_subfolder(platform) {
        dir = dir.join(subfolder);
    }
    Ok(dir.join(published))
}

/// Stage every cell of one variant from the given source.
///
/// Each component is staged independently per cell; the first missing
/// source file fails that cell with the exact path, leaving files already
/// copied in place.
pub fn stage_variant(
    settings: &Settings,
    repo_root: &Path,
    variant: &PluginVariant,
    source: &ArtifactSource,
    configuration: Configuration,
) -> Result<StageReport> {
    let mut report = StageReport {
        variant: variant.key.clone(),
        configuration: configuration.as_str().to_string(),
        files: Vec::new(),
    };

    for platform in settings.tables.platforms() {
        if !variant.supports(platform) {
            continue;
        }
        for architecture in settings.tables.architectures_for(platform) {
            let target = BuildTarget {
                platform,
                architecture: *architecture,
                configuration,
            };
            let source_dir = source.source_dir(settings, &target);
            let dest_dir = destination_dir(repo_root, variant, platform, *architecture)?;
            fs::create_dir_all(&dest_dir).with_context(|| {
                format!("creating staging destination '{}'", dest_dir.display())
            })?;

            for component in &variant.components {
                for file_name in component_files(component, platform) {
                    let source_file = source_dir.join(&file_name);
                    if !source_file.is_file() {
                        return Err(StageFailure::MissingSource {
                            cell: target.to_string(),
                            path: source_file,
                        }
                        .into());
                    }
                    let dest_file = dest_dir.join(&file_name);
                    println!(
                        "[stage:{}] copying {} -> {}",
                        variant.key,
                        source_file.display(),
                        dest_file.display()
                    );
                    fs::copy(&source_file, &dest_file).with_context(|| {
                        format!(
                            "copying '{}' to '{}'",
                            source_file.display(),
                            dest_file.display()
                        )
                    })?;
                    report.files.push(StagedFile {
                        cell: target.to_string(),
                        component: component.clone(),
                        destination: dest_file.clone(),
                        sha256: file_digest(&dest_file)?,
                    });
                }
            }
        }
    }

    Ok(report)
}

fn file_digest(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("reading staged file '{}'", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixTables;
    use tempfile::TempDir;

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Lay down fake build outputs for every cell a variant covers.
    fn populate_local_build(repo_root: &Path, settings: &Settings, variant: &PluginVariant) {
        for platform in &variant.platforms {
            for architecture in settings.tables.architectures_for(*platform) {
                let target = BuildTarget {
                    platform: *platform,
                    architecture: *architecture,
                    configuration: Configuration::RelWithDebInfo,
                };
                let out = paths::output_dir(repo_root, settings, &target);
                for component in &variant.components {
                    for file_name in component_files(component, *platform) {
                        write_file(&out.join(&file_name), &format!("{file_name} {target}"));
                    }
                }
            }
        }
    }

    #[test]
    fn naming_table_is_total_over_the_matrix() {
        let tables = MatrixTables::default();
        for platform in tables.platforms() {
            for architecture in tables.architectures_for(platform) {
                assert!(
                    published_name(platform, *architecture).is_some(),
                    "no published name for {}/{}",
                    platform,
                    architecture
                );
            }
        }
    }

    #[test]
    fn desktop_x64_lands_in_x86_64_without_subfolder() {
        let settings = Settings::default();
        let variant = &settings.variants[0];
        let dest =
            destination_dir(Path::new("/r"), variant, Platform::Windows, Architecture::X64)
                .unwrap();
        assert!(dest.ends_with(
            "Source/Plugins/SpatializerProject/Assets/SpatialAudio.Spatializer.Unity/Plugins/x86_64"
        ));

        let store =
            destination_dir(Path::new("/r"), variant, Platform::WindowsStore, Architecture::Arm64)
                .unwrap();
        assert!(store.ends_with("Plugins/WSA/ARM64"));
    }

    #[test]
    fn stage_copies_dll_and_pdb_per_cell() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let variant = settings.variants[0].clone();
        populate_local_build(temp.path(), &settings, &variant);

        let source = ArtifactSource::LocalBuild {
            repo_root: temp.path().to_path_buf(),
        };
        let report = stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap();

        // 6 cells (2 Windows + 4 WindowsStore), dll + pdb each.
        assert_eq!(report.files.len(), 12);
        // The table's Android row is skipped for a variant that does not
        // cover Android.
        assert!(report.files.iter().all(|f| !f.cell.starts_with("android")));
        let x64_dir = destination_dir(temp.path(), &variant, Platform::Windows, Architecture::X64)
            .unwrap();
        assert!(x64_dir.join("AudioPluginSpatializer.dll").is_file());
        assert!(x64_dir.join("AudioPluginSpatializer.pdb").is_file());
    }

    #[test]
    fn android_cells_stage_shared_object_without_sidecar() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let variant = settings.variants[1].clone();
        populate_local_build(temp.path(), &settings, &variant);

        let source = ArtifactSource::LocalBuild {
            repo_root: temp.path().to_path_buf(),
        };
        stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap();

        let abi_dir = destination_dir(
            temp.path(),
            &variant,
            Platform::Android,
            Architecture::Arm64V8a,
        )
        .unwrap();
        assert!(abi_dir.ends_with("Plugins/Android/arm64-v8a"));
        assert!(abi_dir.join("libAudioPluginSpatializer.so").is_file());
        assert!(abi_dir.join("libSpatialDsp.so").is_file());
        assert!(!abi_dir.join("AudioPluginSpatializer.pdb").exists());
    }

    #[test]
    fn missing_sidecar_fails_cell_and_keeps_prior_copies() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let variant = settings.variants[0].clone();
        populate_local_build(temp.path(), &settings, &variant);

        // Remove one pdb from the WindowsStore x64 cell.
        let broken_target = BuildTarget {
            platform: Platform::WindowsStore,
            architecture: Architecture::X64,
            configuration: Configuration::RelWithDebInfo,
        };
        let missing = paths::output_dir(temp.path(), &settings, &broken_target)
            .join("AudioPluginSpatializer.pdb");
        fs::remove_file(&missing).unwrap();

        let source = ArtifactSource::LocalBuild {
            repo_root: temp.path().to_path_buf(),
        };
        let err = stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap_err();

        let failure = err.downcast_ref::<StageFailure>().expect("stage failure");
        match failure {
            StageFailure::MissingSource { cell, path } => {
                assert_eq!(cell, "windowsstore/x64/relwithdebinfo");
                assert_eq!(path, &missing);
            }
            other => panic!("unexpected failure: {other}"),
        }
        // Windows cells staged before the failure stay in place; the dll of
        // the failing cell was copied before its pdb was found missing.
        let x64_desktop =
            destination_dir(temp.path(), &variant, Platform::Windows, Architecture::X64).unwrap();
        assert!(x64_desktop.join("AudioPluginSpatializer.dll").is_file());
        let broken_dest = destination_dir(
            temp.path(),
            &variant,
            Platform::WindowsStore,
            Architecture::X64,
        )
        .unwrap();
        assert!(broken_dest.join("AudioPluginSpatializer.dll").is_file());
        assert!(!broken_dest.join("AudioPluginSpatializer.pdb").exists());
    }

    #[test]
    fn staging_twice_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let variant = settings.variants[0].clone();
        populate_local_build(temp.path(), &settings, &variant);
        let source = ArtifactSource::LocalBuild {
            repo_root: temp.path().to_path_buf(),
        };

        let first = stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap();
        let second = stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap();

        let digests = |report: &StageReport| {
            report
                .files
                .iter()
                .map(|f| (f.destination.clone(), f.sha256.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(digests(&first), digests(&second));
    }

    #[test]
    fn drop_source_resolves_target_token_directories() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let variant = settings.variants[0].clone();
        let drop_root = temp.path().join("artifacts");

        for platform in &variant.platforms {
            for architecture in settings.tables.architectures_for(*platform) {
                let target = BuildTarget {
                    platform: *platform,
                    architecture: *architecture,
                    configuration: Configuration::RelWithDebInfo,
                };
                let cell_dir = paths::drop_source_dir(&drop_root, &target);
                for component in &variant.components {
                    for file_name in component_files(component, *platform) {
                        write_file(&cell_dir.join(&file_name), "drop");
                    }
                }
            }
        }

        let source = ArtifactSource::Drop { root: drop_root };
        let report = stage_variant(
            &settings,
            temp.path(),
            &variant,
            &source,
            Configuration::RelWithDebInfo,
        )
        .unwrap();
        assert_eq!(report.files.len(), 12);
    }
}
