use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use spatializer_pipeline::config::Settings;
use spatializer_pipeline::matrix::Configuration;
use spatializer_pipeline::package::{self, PackageDescriptor};
use spatializer_pipeline::paths;
use spatializer_pipeline::pipeline;
use spatializer_pipeline::preflight;
use spatializer_pipeline::report;
use spatializer_pipeline::restore;
use spatializer_pipeline::runner::SystemRunner;
use spatializer_pipeline::stage::{self, ArtifactSource};
use spatializer_pipeline::toolchain::BuildOptions;

#[derive(Parser)]
#[command(
    name = "spatializer-pipeline",
    about = "Build, stage, and package the spatializer plugin across its target matrix",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Restore external native packages into the shared external directory
    Restore,
    /// Generate and compile the requested build matrix
    Build(BuildArgs),
    /// Stage compiled binaries into the Unity plugin projects
    Stage(StageArgs),
    /// Stage and package plugin variants
    #[command(subcommand)]
    Package(PackageCommand),
}

#[derive(Args)]
struct BuildArgs {
    /// Platforms to build, comma separated (e.g. windows,windowsstore)
    #[arg(short, long, value_delimiter = ',')]
    platforms: Option<Vec<String>>,
    /// Architectures to build, comma separated (e.g. x64,arm64)
    #[arg(short, long, value_delimiter = ',')]
    architectures: Option<Vec<String>>,
    /// Configurations to build, comma separated (e.g. debug,relwithdebinfo)
    #[arg(short, long, value_delimiter = ',')]
    configurations: Option<Vec<String>>,
    /// Clean before compiling, where the toolchain has a clean step
    #[arg(long)]
    clean: bool,
    /// Skip generation of test configurations
    #[arg(long)]
    no_test: bool,
    /// Semantic version propagated into generation
    #[arg(short = 'v', long)]
    version: Option<String>,
    /// Abort on the first failed target instead of finishing the matrix
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Args)]
struct StageArgs {
    /// External artifacts directory; local build outputs when omitted
    #[arg(short, long)]
    source: Option<PathBuf>,
    /// Configuration to stage
    #[arg(short, long, default_value = "relwithdebinfo")]
    configuration: String,
}

#[derive(Subcommand)]
enum PackageCommand {
    /// UPM (npm) packages, one per plugin variant
    Upm(UpmArgs),
    /// NuGet package for the desktop variant
    Nuget(NugetArgs),
    /// .unitypackage export of the desktop project via the Unity editor
    Unity(UnityArgs),
}

#[derive(Args)]
struct UpmArgs {
    /// Stage from this external artifacts directory instead of local builds
    #[arg(short, long)]
    stage_source: Option<PathBuf>,
    /// Output location; build/npm when unspecified
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Semantic version string for the packages
    #[arg(short = 'v', long)]
    version: Option<String>,
    /// Publish to the npm feed instead of producing local archives
    #[arg(short, long)]
    publish: bool,
    /// Validate publishing without pushing
    #[arg(short, long)]
    dry_run: bool,
    /// Publish an already-built .tgz, bypassing stage/version/pack
    #[arg(long)]
    archive: Option<PathBuf>,
}

#[derive(Args)]
struct NugetArgs {
    /// Stage from this external artifacts directory instead of local builds
    #[arg(short, long)]
    stage_source: Option<PathBuf>,
    /// Output location; build/nuget when unspecified
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Version number for the package
    #[arg(short = 'v', long)]
    version: String,
}

#[derive(Args)]
struct UnityArgs {
    /// Directory the Unity editor executable is installed in
    #[arg(short, long)]
    unity_dir: PathBuf,
    /// Stage from this external artifacts directory instead of local builds
    #[arg(short, long)]
    stage_source: Option<PathBuf>,
    /// Output location; build/unity when unspecified
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Version number for the package
    #[arg(short = 'v', long)]
    version: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runner = SystemRunner;
    let repo_root = paths::locate_repo_root(&runner)?;
    let settings = Settings::load(&repo_root)?;

    match cli.command {
        Command::Restore => restore::restore(&runner, &settings, &repo_root),
        Command::Build(args) => run_build(&runner, &settings, &repo_root, args),
        Command::Stage(args) => {
            let configuration = settings.tables.parse_configuration(&args.configuration)?;
            run_stage(&settings, &repo_root, args.source, configuration)?;
            Ok(())
        }
        Command::Package(PackageCommand::Upm(args)) => {
            run_package_upm(&runner, &settings, &repo_root, args)
        }
        Command::Package(PackageCommand::Nuget(args)) => {
            run_package_nuget(&runner, &settings, &repo_root, args)
        }
        Command::Package(PackageCommand::Unity(args)) => {
            run_package_unity(&runner, &settings, &repo_root, args)
        }
    }
}

fn run_build(
    runner: &SystemRunner,
    settings: &Settings,
    repo_root: &std::path::Path,
    args: BuildArgs,
) -> Result<()> {
    // Validate the matrix before any side effect.
    let targets = settings.tables.expand(
        args.platforms.as_deref(),
        args.architectures.as_deref(),
        args.configurations.as_deref(),
    )?;
    if targets.is_empty() {
        bail!("requested filters match no build targets");
    }
    preflight::check_build_tools(&targets)?;

    println!("[matrix] {} target(s) to build", targets.len());
    let opts = BuildOptions {
        clean: args.clean,
        include_tests: !args.no_test,
        product_version: args.version,
    };
    let cancel = AtomicBool::new(false);
    let manifest = pipeline::run_matrix(
        runner, settings, repo_root, &targets, &opts, args.fail_fast, &cancel,
    )?;

    let failed = manifest.failed_targets();
    if !failed.is_empty() {
        bail!("{} of {} target(s) failed", failed.len(), manifest.targets.len());
    }
    Ok(())
}

fn run_stage(
    settings: &Settings,
    repo_root: &std::path::Path,
    source_override: Option<PathBuf>,
    configuration: Configuration,
) -> Result<()> {
    let source = match source_override {
        Some(root) => ArtifactSource::Drop { root },
        None => ArtifactSource::LocalBuild {
            repo_root: repo_root.to_path_buf(),
        },
    };

    let mut reports = Vec::new();
    for variant in &settings.variants {
        reports.push(stage::stage_variant(
            settings, repo_root, variant, &source, configuration,
        )?);
    }

    let manifest_path = repo_root
        .join(&settings.build_root)
        .join(report::STAGE_MANIFEST_FILENAME);
    report::write_stage_manifest(&manifest_path, &reports)?;
    println!("[stage] manifest written to '{}'", manifest_path.display());
    Ok(())
}

fn run_package_upm(
    runner: &SystemRunner,
    settings: &Settings,
    repo_root: &std::path::Path,
    args: UpmArgs,
) -> Result<()> {
    preflight::check_required_tools(preflight::NPM_TOOLS)?;

    // Re-publishing a previously produced archive skips everything else.
    if let Some(archive) = args.archive {
        return package::publish_archive(runner, &archive, args.dry_run);
    }

    let Some(version) = args.version else {
        bail!("a version is required to pack or publish (use --version)");
    };

    run_stage(
        settings,
        repo_root,
        args.stage_source,
        Configuration::RelWithDebInfo,
    )?;

    let output_dir = args
        .output
        .unwrap_or_else(|| paths::npm_output_dir(repo_root, settings));
    for variant in &settings.variants {
        let descriptor = PackageDescriptor {
            variant,
            version: version.clone(),
            output_dir: output_dir.clone(),
            publish: args.publish,
            dry_run: args.dry_run,
        };
        package::emit_upm(runner, repo_root, &descriptor)?;
    }
    Ok(())
}

fn run_package_nuget(
    runner: &SystemRunner,
    settings: &Settings,
    repo_root: &std::path::Path,
    args: NugetArgs,
) -> Result<()> {
    preflight::check_required_tools(preflight::NUGET_TOOLS)?;
    run_stage(
        settings,
        repo_root,
        args.stage_source,
        Configuration::RelWithDebInfo,
    )?;

    let output_dir = args
        .output
        .unwrap_or_else(|| paths::nuget_output_dir(repo_root, settings));
    let descriptor = PackageDescriptor {
        variant: settings.desktop_variant(),
        version: args.version,
        output_dir,
        publish: false,
        dry_run: false,
    };
    package::emit_nuget(runner, repo_root, &descriptor)?;
    Ok(())
}

fn run_package_unity(
    runner: &SystemRunner,
    settings: &Settings,
    repo_root: &std::path::Path,
    args: UnityArgs,
) -> Result<()> {
    run_stage(
        settings,
        repo_root,
        args.stage_source,
        Configuration::RelWithDebInfo,
    )?;

    let output_dir = args
        .output
        .unwrap_or_else(|| paths::unity_output_dir(repo_root, settings));
    let descriptor = PackageDescriptor {
        variant: settings.desktop_variant(),
        version: args.version,
        output_dir,
        publish: false,
        dry_run: false,
    };
    package::emit_unity(runner, repo_root, &descriptor, &args.unity_dir)?;
    Ok(())
}
