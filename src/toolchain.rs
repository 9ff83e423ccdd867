//! Toolchain profiles: per-target generator and compile commands.
//!
//! Every build target maps to exactly one profile. Profiles for the same
//! platform differ only by architecture-dependent flags. The Windows
//! family generates Visual Studio solutions and compiles with msbuild;
//! Android cross-compiles through the NDK toolchain file with a makefile
//! generator.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::Settings;
use crate::matrix::{Architecture, BuildTarget, Platform};
use crate::runner::Invocation;

const VS_GENERATOR: &str = "Visual Studio 16 2019";
const MAKEFILES_GENERATOR: &str = "MinGW Makefiles";
const ANDROID_PLATFORM_LEVEL: &str = "android-23";

/// Caller-supplied knobs for one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Request a clean step before compiling, where the toolchain has one.
    pub clean: bool,
    /// Generate test configurations (`-DCMAKE_TEST`); on by default.
    pub include_tests: bool,
    /// Product version propagated into generation when supplied.
    pub product_version: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            clean: false,
            include_tests: true,
            product_version: None,
        }
    }
}

/// How compiled output is produced after generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStep {
    /// msbuild on the generated solution; configuration chosen at compile
    /// time, clean via `/t:Rebuild`.
    MsBuild,
    /// `cmake --build .`; configuration fixed at generation time, no
    /// clean verb (the clean flag is ignored).
    CMakeBuild,
}

/// Derived, never stored: the generator name and flags for one target.
#[derive(Debug, Clone)]
pub struct ToolchainProfile {
    pub generator: &'static str,
    pub generator_defines: Vec<String>,
    pub compile: CompileStep,
    pub supports_clean: bool,
}

/// Resolve the toolchain profile for a target.
///
/// Fails closed on (platform, architecture) pairs outside the supported
/// matrix, and on Android targets when no NDK root is configured.
pub fn profile(settings: &Settings, target: &BuildTarget) -> Result<ToolchainProfile> {
    if !settings.tables.supports(target.platform, target.architecture) {
        bail!(
            "unsupported matrix cell {}/{}; not building",
            target.platform,
            target.architecture
        );
    }

    match target.platform {
        Platform::Windows => Ok(ToolchainProfile {
            generator: VS_GENERATOR,
            generator_defines: vec!["-A".to_string(), target.architecture.to_string()],
            compile: CompileStep::MsBuild,
            supports_clean: true,
        }),
        Platform::WindowsStore => {
            let mut defines = vec!["-A".to_string(), target.architecture.to_string()];
            defines.push("-DCMAKE_SYSTEM_NAME=WindowsStore".to_string());
            defines.push("-DCMAKE_SYSTEM_VERSION=10.0".to_string());
            Ok(ToolchainProfile {
                generator: VS_GENERATOR,
                generator_defines: defines,
                compile: CompileStep::MsBuild,
                supports_clean: true,
            })
        }
        Platform::Android => {
            let (toolchain_file, make_program) = settings
                .android_toolchain_file()
                .zip(settings.android_make_program())
                .with_context(|| {
                    format!(
                        "building {} requires an NDK root (set ANDROID_NDK_HOME or ndk_root in pipeline.toml)",
                        target
                    )
                })?;

            let mut defines = vec![
                format!("-DCMAKE_BUILD_TYPE={}", target.configuration.build_type()),
                format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain_file.display()),
                format!("-DCMAKE_MAKE_PROGRAM={}", make_program.display()),
                format!("-DANDROID_ABI={}", target.architecture),
            ];
            if matches!(
                target.architecture,
                Architecture::ArmeabiV7a | Architecture::Arm64V8a
            ) {
                defines.push("-DANDROID_ARM_NEON=TRUE".to_string());
            }
            defines.push(format!("-DANDROID_PLATFORM_LEVEL={}", ANDROID_PLATFORM_LEVEL));
            defines.push("-DANDROID_TOOLCHAIN=clang".to_string());

            Ok(ToolchainProfile {
                generator: MAKEFILES_GENERATOR,
                generator_defines: defines,
                compile: CompileStep::CMakeBuild,
                supports_clean: false,
            })
        }
    }
}

/// CMake generation command for a target, run inside its build directory
/// with the repo root as the source tree.
pub fn generate_invocation(
    repo_root: &Path,
    build_dir: &Path,
    profile: &ToolchainProfile,
    opts: &BuildOptions,
) -> Invocation {
    let mut invocation = Invocation::new("cmake")
        .arg("-G")
        .arg(profile.generator)
        .args(profile.generator_defines.clone());

    invocation = invocation.arg(format!(
        "-DCMAKE_TEST={}",
        if opts.include_tests { "TRUE" } else { "FALSE" }
    ));
    if let Some(version) = &opts.product_version {
        invocation = invocation.arg(format!("-DPRODUCT_VERSION={}", version));
    }
    invocation
        .arg(repo_root.display().to_string())
        .cwd(build_dir)
}

/// Compile command for a target, run inside its build directory.
pub fn compile_invocation(
    settings: &Settings,
    build_dir: &Path,
    target: &BuildTarget,
    profile: &ToolchainProfile,
    clean: bool,
) -> Invocation {
    match profile.compile {
        CompileStep::MsBuild => {
            let solution = build_dir.join(&settings.solution_file);
            let mut invocation = Invocation::new("msbuild")
                .arg("-m")
                .arg(solution.display().to_string())
                .arg(format!(
                    "/p:Configuration={}",
                    target.configuration.build_type()
                ));
            if clean && profile.supports_clean {
                invocation = invocation.arg("/t:Rebuild");
            }
            invocation.cwd(build_dir)
        }
        CompileStep::CMakeBuild => Invocation::new("cmake")
            .args(["--build", "."])
            .cwd(build_dir),
    }
}
