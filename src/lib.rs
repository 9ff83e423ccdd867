//! Build-matrix orchestration and packaging pipeline for the spatializer
//! audio plugin.
//!
//! The plugin ships for Windows, WindowsStore (UWP), and Android in
//! multiple architectures and configurations, staged into Unity
//! plugin-project layouts and packaged as UPM and NuGet packages. This
//! crate owns the part that has to be right every time:
//!
//! - **Matrix expansion** - supported-value tables intersected with user
//!   filters, in deterministic build order
//! - **Toolchain invocation** - per-target generator and compile commands,
//!   including Android cross-compilation through the NDK
//! - **Artifact staging** - copying binaries (and symbol sidecars where
//!   the platform has them) into each plugin variant's asset layout
//! - **Package emission** - npm/NuGet version-stamp, pack, and publish
//!
//! # Architecture
//!
//! ```text
//! expand ──▶ restore (once) ──▶ build per target ──▶ stage per variant ──▶ package
//!    │              │                   │                    │
//! MatrixTables  nuget restore   cmake + msbuild /      npm / nuget
//! (config.rs)                   cmake --build
//! ```
//!
//! Every external tool call goes through [`runner::ProcessRunner`], so the
//! orchestration above is testable without a compiler or packager on PATH.
//! Layout decisions live in [`paths`] and [`stage`]; constant tables and
//! the two shipped plugin variants live in [`config`].
//!
//! # Example
//!
//! ```rust,ignore
//! use spatializer_pipeline::config::Settings;
//! use spatializer_pipeline::runner::SystemRunner;
//! use spatializer_pipeline::toolchain::BuildOptions;
//! use std::sync::atomic::AtomicBool;
//!
//! let runner = SystemRunner;
//! let root = spatializer_pipeline::paths::locate_repo_root(&runner)?;
//! let settings = Settings::load(&root)?;
//! let targets = settings.tables.expand(None, None, None)?;
//! let cancel = AtomicBool::new(false);
//! spatializer_pipeline::pipeline::run_matrix(
//!     &runner, &settings, &root, &targets,
//!     &BuildOptions::default(), false, &cancel,
//! )?;
//! ```

pub mod config;
pub mod matrix;
pub mod package;
pub mod paths;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod restore;
pub mod runner;
pub mod stage;
pub mod toolchain;

pub use config::{PluginVariant, Settings};
pub use matrix::{Architecture, BuildTarget, Configuration, MatrixTables, Platform};
pub use runner::{Invocation, ProcessRunner, SystemRunner};
