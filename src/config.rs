//! Pipeline settings: repo-relative constants, plugin variants, and the
//! supported-matrix tables.
//!
//! Built once at process start and passed by reference into every
//! component; no module-level mutable state. Defaults match the shipped
//! repository layout and can be overridden by an optional `pipeline.toml`
//! at the repo root.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::matrix::{MatrixTables, Platform};

/// A named distributable plugin identity: asset folder, npm package name,
/// Unity project root, and the binary components it bundles.
#[derive(Debug, Clone)]
pub struct PluginVariant {
    /// Short key used in logs and manifests.
    pub key: String,
    /// Asset folder name under `<project>/Assets/`.
    pub plugin_name: String,
    /// npm distribution-package name.
    pub package_name: String,
    /// Unity project root, relative to the repo root.
    pub project_dir: PathBuf,
    /// Binary base names; each resolves to `<name>.dll` + `<name>.pdb` on
    /// the Windows family and `lib<name>.so` on Android.
    pub components: Vec<String>,
    pub platforms: Vec<Platform>,
}

impl PluginVariant {
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Asset directory for this variant, relative to the repo root.
    pub fn asset_dir(&self) -> PathBuf {
        self.project_dir.join("Assets").join(&self.plugin_name)
    }
}

/// Optional overrides read from `pipeline.toml` at the repo root.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    build_root: Option<String>,
    solution_file: Option<String>,
    external_dir: Option<String>,
    packages_config: Option<String>,
    nuget_config: Option<String>,
    ndk_root: Option<String>,
}

/// Immutable pipeline configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Build tree root under the repo root.
    pub build_root: String,
    /// Solution file CMake generates per Windows-family build directory.
    pub solution_file: String,
    /// Shared directory restored native packages land in, repo-relative.
    pub external_dir: PathBuf,
    /// NuGet packages.config listing the native dependencies, repo-relative.
    pub packages_config: PathBuf,
    /// NuGet feed configuration, repo-relative.
    pub nuget_config: PathBuf,
    /// Android NDK root; required only when Android targets are built.
    pub ndk_root: Option<PathBuf>,
    pub tables: MatrixTables,
    pub variants: Vec<PluginVariant>,
}

pub const SETTINGS_FILENAME: &str = "pipeline.toml";

impl Default for Settings {
    fn default() -> Self {
        Self {
            build_root: "build".to_string(),
            solution_file: "SpatialAudioPlugin.sln".to_string(),
            external_dir: PathBuf::from("Source/External"),
            packages_config: PathBuf::from("Tools/packages.config"),
            nuget_config: PathBuf::from("Tools/nuget.config"),
            ndk_root: env::var_os("ANDROID_NDK_HOME").map(PathBuf::from),
            tables: MatrixTables::default(),
            variants: default_variants(),
        }
    }
}

impl Settings {
    /// Defaults merged with `pipeline.toml` overrides when the file exists.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let mut settings = Self::default();
        let path = repo_root.join(SETTINGS_FILENAME);
        if !path.is_file() {
            return Ok(settings);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading settings '{}'", path.display()))?;
        let overrides: SettingsToml = toml::from_str(&raw)
            .with_context(|| format!("parsing settings '{}'", path.display()))?;

        if let Some(build_root) = overrides.build_root {
            settings.build_root = build_root;
        }
        if let Some(solution_file) = overrides.solution_file {
            settings.solution_file = solution_file;
        }
        if let Some(external_dir) = overrides.external_dir {
            settings.external_dir = PathBuf::from(external_dir);
        }
        if let Some(packages_config) = overrides.packages_config {
            settings.packages_config = PathBuf::from(packages_config);
        }
        if let Some(nuget_config) = overrides.nuget_config {
            settings.nuget_config = PathBuf::from(nuget_config);
        }
        if let Some(ndk_root) = overrides.ndk_root {
            settings.ndk_root = Some(PathBuf::from(ndk_root));
        }
        Ok(settings)
    }

    /// CMake cross-compilation toolchain file inside the NDK.
    pub fn android_toolchain_file(&self) -> Option<PathBuf> {
        self.ndk_root
            .as_ref()
            .map(|ndk| ndk.join("build/cmake/android.toolchain.cmake"))
    }

    /// Prebuilt make binary shipped with the NDK for makefile generators.
    pub fn android_make_program(&self) -> Option<PathBuf> {
        self.ndk_root
            .as_ref()
            .map(|ndk| ndk.join("prebuilt/windows-x86_64/bin/make.exe"))
    }

    /// The desktop spatializer variant, the one exported by the
    /// single-project packagers (NuGet, Unity editor export).
    pub fn desktop_variant(&self) -> &PluginVariant {
        &self.variants[0]
    }
}

fn default_variants() -> Vec<PluginVariant> {
    vec![
        PluginVariant {
            key: "desktop".to_string(),
            plugin_name: "SpatialAudio.Spatializer.Unity".to_string(),
            package_name: "com.spatialaudio.spatializer.unity".to_string(),
            project_dir: PathBuf::from("Source/Plugins/SpatializerProject"),
            components: vec!["AudioPluginSpatializer".to_string()],
            platforms: vec![Platform::Windows, Platform::WindowsStore],
        },
        PluginVariant {
            key: "crossplatform".to_string(),
            plugin_name: "SpatialAudio.Spatializer.CrossPlatform".to_string(),
            package_name: "com.spatialaudio.spatializer.crossplatform".to_string(),
            project_dir: PathBuf::from("Source/Plugins/CrossPlatformProject"),
            components: vec![
                "AudioPluginSpatializer".to_string(),
                "SpatialDsp".to_string(),
            ],
            platforms: vec![Platform::Windows, Platform::WindowsStore, Platform::Android],
        },
    ]
}
