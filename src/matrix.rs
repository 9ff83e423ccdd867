//! Supported build matrix and target expansion.
//!
//! The matrix is the Cartesian product of the per-platform architecture
//! table and the global configuration list, restricted by caller filters.
//! Every component that names a (platform, architecture) pair validates it
//! against [`MatrixTables`] before touching the filesystem.

use std::fmt;

use thiserror::Error;

/// Target platform for a plugin binary.
///
/// A closed set: build and staging logic dispatches on these variants by
/// pattern match, never by string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    WindowsStore,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::WindowsStore => "WindowsStore",
            Platform::Android => "Android",
        }
    }

    /// Lowercase name used for build directories and drop-folder tokens.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::WindowsStore => "windowsstore",
            Platform::Android => "android",
        }
    }

    /// Windows and WindowsStore share the Visual Studio toolchain and the
    /// dll/pdb binary layout.
    pub fn is_windows_family(&self) -> bool {
        matches!(self, Platform::Windows | Platform::WindowsStore)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processor architecture, scoped per platform by [`MatrixTables`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    Win32,
    X64,
    Arm,
    Arm64,
    X86,
    ArmeabiV7a,
    Arm64V8a,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Win32 => "Win32",
            Architecture::X64 => "x64",
            Architecture::Arm => "ARM",
            Architecture::Arm64 => "ARM64",
            Architecture::X86 => "x86",
            Architecture::ArmeabiV7a => "armeabi-v7a",
            Architecture::Arm64V8a => "arm64-v8a",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build configuration, global across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Configuration {
    Debug,
    RelWithDebInfo,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "debug",
            Configuration::RelWithDebInfo => "relwithdebinfo",
        }
    }

    /// Mixed-case spelling expected by CMake and msbuild.
    pub fn build_type(&self) -> &'static str {
        match self {
            Configuration::Debug => "Debug",
            Configuration::RelWithDebInfo => "RelWithDebInfo",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (platform, architecture, configuration) combination to build.
///
/// Immutable value; identity is the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildTarget {
    pub platform: Platform,
    pub architecture: Architecture,
    pub configuration: Configuration,
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.platform.dir_name(),
            self.architecture,
            self.configuration
        )
    }
}

/// An unrecognized platform/architecture/configuration token.
///
/// Raised before any filesystem or process side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {axis} '{token}'; expected one of: {valid}")]
pub struct InvalidMatrixToken {
    pub axis: &'static str,
    pub token: String,
    pub valid: String,
}

/// The supported-matrix tables: platform order, per-platform architecture
/// lists, and the global configuration order.
///
/// Constructed once at process start and passed by reference into the
/// expander, invoker, and stager. Declaration order is load-bearing: it is
/// the order targets are built in and the order tests assert on.
#[derive(Debug, Clone)]
pub struct MatrixTables {
    platforms: Vec<(Platform, Vec<Architecture>)>,
    configurations: Vec<Configuration>,
}

impl Default for MatrixTables {
    fn default() -> Self {
        Self {
            platforms: vec![
                (
                    Platform::Windows,
                    vec![Architecture::Win32, Architecture::X64],
                ),
                (
                    Platform::WindowsStore,
                    vec![
                        Architecture::Win32,
                        Architecture::X64,
                        Architecture::Arm,
                        Architecture::Arm64,
                    ],
                ),
                (
                    Platform::Android,
                    vec![
                        Architecture::X86,
                        Architecture::ArmeabiV7a,
                        Architecture::Arm64V8a,
                    ],
                ),
            ],
            configurations: vec![Configuration::Debug, Configuration::RelWithDebInfo],
        }
    }
}

impl MatrixTables {
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.platforms.iter().map(|(platform, _)| *platform)
    }

    pub fn architectures_for(&self, platform: Platform) -> &[Architecture] {
        self.platforms
            .iter()
            .find(|(candidate, _)| *candidate == platform)
            .map(|(_, archs)| archs.as_slice())
            .unwrap_or(&[])
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// Whether (platform, architecture) is a supported matrix cell.
    pub fn supports(&self, platform: Platform, architecture: Architecture) -> bool {
        self.architectures_for(platform).contains(&architecture)
    }

    /// All architectures across every platform, in table order, deduplicated.
    pub fn all_architectures(&self) -> Vec<Architecture> {
        let mut all = Vec::new();
        for (_, archs) in &self.platforms {
            for arch in archs {
                if !all.contains(arch) {
                    all.push(*arch);
                }
            }
        }
        all
    }

    /// Expand user filters into the ordered sequence of build targets.
    ///
    /// Each filter is an optional set of case-insensitive tokens; `None`
    /// means every supported value on that axis. An unrecognized token
    /// fails with [`InvalidMatrixToken`] before any work starts. An
    /// architecture valid for one requested platform but not another is
    /// silently excluded for the non-supporting platform (intersection
    /// semantics), since a single filter may span platforms.
    pub fn expand(
        &self,
        platforms: Option<&[String]>,
        architectures: Option<&[String]>,
        configurations: Option<&[String]>,
    ) -> Result<Vec<BuildTarget>, InvalidMatrixToken> {
        let requested_platforms = match platforms {
            Some(tokens) => Some(self.parse_platform_tokens(tokens)?),
            None => None,
        };
        let requested_architectures = match architectures {
            Some(tokens) => Some(self.parse_architecture_tokens(tokens)?),
            None => None,
        };
        let requested_configurations = match configurations {
            Some(tokens) => Some(self.parse_configuration_tokens(tokens)?),
            None => None,
        };

        let mut targets = Vec::new();
        for (platform, archs) in &self.platforms {
            if let Some(requested) = &requested_platforms {
                if !requested.contains(platform) {
                    continue;
                }
            }
            for architecture in archs {
                if let Some(requested) = &requested_architectures {
                    if !requested.contains(architecture) {
                        continue;
                    }
                }
                for configuration in &self.configurations {
                    if let Some(requested) = &requested_configurations {
                        if !requested.contains(configuration) {
                            continue;
                        }
                    }
                    targets.push(BuildTarget {
                        platform: *platform,
                        architecture: *architecture,
                        configuration: *configuration,
                    });
                }
            }
        }
        Ok(targets)
    }

    /// Parse a single configuration token, case-insensitively.
    pub fn parse_configuration(&self, token: &str) -> Result<Configuration, InvalidMatrixToken> {
        let parsed = self.parse_configuration_tokens(&[token.to_string()])?;
        Ok(parsed[0])
    }

    fn parse_platform_tokens(&self, tokens: &[String]) -> Result<Vec<Platform>, InvalidMatrixToken> {
        let mut parsed = Vec::new();
        for token in tokens {
            let matched = self
                .platforms()
                .find(|platform| platform.as_str().eq_ignore_ascii_case(token.trim()));
            match matched {
                Some(platform) => parsed.push(platform),
                None => {
                    return Err(InvalidMatrixToken {
                        axis: "platform",
                        token: token.clone(),
                        valid: join_names(self.platforms().map(|p| p.as_str())),
                    })
                }
            }
        }
        Ok(parsed)
    }

    fn parse_architecture_tokens(
        &self,
        tokens: &[String],
    ) -> Result<Vec<Architecture>, InvalidMatrixToken> {
        let all = self.all_architectures();
        let mut parsed = Vec::new();
        for token in tokens {
            let matched = all
                .iter()
                .find(|arch| arch.as_str().eq_ignore_ascii_case(token.trim()));
            match matched {
                Some(arch) => parsed.push(*arch),
                None => {
                    return Err(InvalidMatrixToken {
                        axis: "architecture",
                        token: token.clone(),
                        valid: join_names(all.iter().map(|a| a.as_str())),
                    })
                }
            }
        }
        Ok(parsed)
    }

    fn parse_configuration_tokens(
        &self,
        tokens: &[String],
    ) -> Result<Vec<Configuration>, InvalidMatrixToken> {
        let mut parsed = Vec::new();
        for token in tokens {
            let matched = self
                .configurations
                .iter()
                .find(|config| config.as_str().eq_ignore_ascii_case(token.trim()));
            match matched {
                Some(config) => parsed.push(*config),
                None => {
                    return Err(InvalidMatrixToken {
                        axis: "configuration",
                        token: token.clone(),
                        valid: join_names(self.configurations.iter().map(|c| c.as_str())),
                    })
                }
            }
        }
        Ok(parsed)
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn full_matrix_in_declared_order() {
        let tables = MatrixTables::default();
        let targets = tables.expand(None, None, None).unwrap();

        // 2 + 4 + 3 architectures, times 2 configurations.
        assert_eq!(targets.len(), 18);
        assert_eq!(
            targets[0],
            BuildTarget {
                platform: Platform::Windows,
                architecture: Architecture::Win32,
                configuration: Configuration::Debug,
            }
        );
        let last = targets.last().unwrap();
        assert_eq!(last.platform, Platform::Android);
        assert_eq!(last.architecture, Architecture::Arm64V8a);
        assert_eq!(last.configuration, Configuration::RelWithDebInfo);

        // Platforms appear contiguously in table order.
        let platform_order: Vec<Platform> = {
            let mut order = Vec::new();
            for target in &targets {
                if order.last() != Some(&target.platform) {
                    order.push(target.platform);
                }
            }
            order
        };
        assert_eq!(
            platform_order,
            vec![Platform::Windows, Platform::WindowsStore, Platform::Android]
        );
    }

    #[test]
    fn architecture_filter_intersects_per_platform() {
        let tables = MatrixTables::default();
        let targets = tables
            .expand(
                Some(&tokens(&["windowsstore"])),
                Some(&tokens(&["x64", "arm64"])),
                Some(&tokens(&["relwithdebinfo"])),
            )
            .unwrap();

        let archs: Vec<Architecture> = targets.iter().map(|t| t.architecture).collect();
        assert_eq!(archs, vec![Architecture::X64, Architecture::Arm64]);
        assert!(targets.iter().all(|t| t.platform == Platform::WindowsStore));
    }

    #[test]
    fn android_only_architecture_excluded_on_windows() {
        let tables = MatrixTables::default();
        let targets = tables
            .expand(
                Some(&tokens(&["windows", "android"])),
                Some(&tokens(&["armeabi-v7a"])),
                None,
            )
            .unwrap();

        assert!(!targets.is_empty());
        assert!(targets.iter().all(|t| t.platform == Platform::Android));
    }

    #[test]
    fn tokens_are_case_insensitive() {
        let tables = MatrixTables::default();
        let targets = tables
            .expand(
                Some(&tokens(&["WINDOWS"])),
                Some(&tokens(&["X64"])),
                Some(&tokens(&["RelWithDebInfo"])),
            )
            .unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn unknown_platform_token_fails_with_valid_set() {
        let tables = MatrixTables::default();
        let err = tables
            .expand(Some(&tokens(&["linux"])), None, None)
            .unwrap_err();
        assert_eq!(err.axis, "platform");
        assert_eq!(err.token, "linux");
        assert!(err.valid.contains("WindowsStore"));
    }

    #[test]
    fn unknown_architecture_token_fails() {
        let tables = MatrixTables::default();
        let err = tables
            .expand(None, Some(&tokens(&["mips"])), None)
            .unwrap_err();
        assert_eq!(err.axis, "architecture");
        assert!(err.valid.contains("armeabi-v7a"));
    }

    #[test]
    fn unknown_configuration_token_fails() {
        let tables = MatrixTables::default();
        let err = tables
            .expand(None, None, Some(&tokens(&["release"])))
            .unwrap_err();
        assert_eq!(err.axis, "configuration");
        assert_eq!(err.valid, "debug, relwithdebinfo");
    }

    #[test]
    fn supports_checks_platform_scoped_membership() {
        let tables = MatrixTables::default();
        assert!(tables.supports(Platform::WindowsStore, Architecture::Arm64));
        assert!(!tables.supports(Platform::Windows, Architecture::Arm64));
        assert!(!tables.supports(Platform::Android, Architecture::X64));
    }
}
