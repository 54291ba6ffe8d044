//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.rule-enhancer/config.toml` - User-wide defaults
//! - Project: `.rule-enhancer/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. The merged config is
//! turned into the `ProcessDefaults` snapshot an `Enhancer` is built with.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::universe::DependencyMode;
use crate::enhance::compiler::CompilerOptions;
use crate::enhance::native::NativePlatform;
use crate::enhance::pipeline::ProcessDefaults;

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR: &str = ".rule-enhancer";

/// rule-enhancer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Test settings
    pub test: TestConfig,

    /// Java compiler settings
    pub java: JavaConfig,

    /// Kotlin compiler settings
    pub kotlin: KotlinConfig,

    /// Android platform settings
    pub android: AndroidConfig,

    /// Native library settings
    pub cxx: CxxConfig,

    /// Output layout
    pub output: OutputConfig,
}

/// Test-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Timeout applied to tests that do not set `test_rule_timeout_ms`
    pub default_timeout_ms: Option<u64>,
}

/// Java compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    /// Default `-source` level
    pub source_level: Option<String>,

    /// Default `-target` level
    pub target_level: Option<String>,

    /// Arguments passed to every compile
    pub extra_arguments: Vec<String>,

    /// Annotation processors run on every compile
    pub annotation_processors: BTreeSet<String>,

    /// Record class usage for dependency pruning
    pub track_class_usage: Option<bool>,
}

/// Kotlin compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KotlinConfig {
    /// Path to `kotlinc`
    pub kotlinc: Option<PathBuf>,
}

/// Android platform configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Platform jars (e.g. `android.jar`) for the boot classpath
    pub boot_classpath: Vec<PathBuf>,

    /// How far to look for resource dependencies
    pub resource_dependency_mode: Option<DependencyMode>,
}

/// Native library configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CxxConfig {
    /// Platform name (defaults to the host)
    pub platform: Option<String>,

    /// Loader search-path variable (defaults to the host's)
    pub search_path_env: Option<String>,
}

/// Output layout configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the output tree (defaults to `buck-out`)
    pub root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Test settings
        if other.test.default_timeout_ms.is_some() {
            self.test.default_timeout_ms = other.test.default_timeout_ms;
        }

        // Java settings
        if other.java.source_level.is_some() {
            self.java.source_level = other.java.source_level;
        }
        if other.java.target_level.is_some() {
            self.java.target_level = other.java.target_level;
        }
        if !other.java.extra_arguments.is_empty() {
            self.java.extra_arguments = other.java.extra_arguments;
        }
        if !other.java.annotation_processors.is_empty() {
            self.java.annotation_processors = other.java.annotation_processors;
        }
        if other.java.track_class_usage.is_some() {
            self.java.track_class_usage = other.java.track_class_usage;
        }

        // Kotlin settings
        if other.kotlin.kotlinc.is_some() {
            self.kotlin.kotlinc = other.kotlin.kotlinc;
        }

        // Android settings
        if !other.android.boot_classpath.is_empty() {
            self.android.boot_classpath = other.android.boot_classpath;
        }
        if other.android.resource_dependency_mode.is_some() {
            self.android.resource_dependency_mode = other.android.resource_dependency_mode;
        }

        // Native settings
        if other.cxx.platform.is_some() {
            self.cxx.platform = other.cxx.platform;
        }
        if other.cxx.search_path_env.is_some() {
            self.cxx.search_path_env = other.cxx.search_path_env;
        }

        // Output settings
        if other.output.root.is_some() {
            self.output.root = other.output.root;
        }
    }

    /// Snapshot the process-wide defaults the pipeline reads.
    pub fn defaults(&self) -> ProcessDefaults {
        let template = CompilerOptions::default();
        let compiler_options = CompilerOptions {
            source_level: self
                .java
                .source_level
                .clone()
                .unwrap_or(template.source_level),
            target_level: self
                .java
                .target_level
                .clone()
                .unwrap_or(template.target_level),
            extra_arguments: self.java.extra_arguments.clone(),
            annotation_processors: self.java.annotation_processors.clone(),
            track_class_usage: self
                .java
                .track_class_usage
                .unwrap_or(template.track_class_usage),
            ..template
        };

        let host = NativePlatform::host();
        let native_platform = NativePlatform {
            name: self.cxx.platform.clone().unwrap_or(host.name),
            search_path_env: self
                .cxx
                .search_path_env
                .clone()
                .unwrap_or(host.search_path_env),
        };

        let fallback = ProcessDefaults::default();
        ProcessDefaults {
            test_rule_timeout_ms: self.test.default_timeout_ms,
            compiler_options,
            kotlinc: self.kotlin.kotlinc.clone().unwrap_or(fallback.kotlinc),
            android_boot_classpath: self.android.boot_classpath.clone(),
            native_platform,
            resource_dependency_mode: self
                .android
                .resource_dependency_mode
                .unwrap_or(fallback.resource_dependency_mode),
        }
    }

    /// Root of the output tree, relative paths resolved against `base`.
    pub fn output_root(&self, base: &Path) -> PathBuf {
        let root = self
            .output
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("buck-out"));
        if root.is_absolute() {
            root
        } else {
            base.join(root)
        }
    }
}

/// Get the global config directory (~/.rule-enhancer).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR))
}

/// Get the global config path (~/.rule-enhancer/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.rule-enhancer/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join("config.toml")
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.rule-enhancer/config.toml)
/// 2. Global config (~/.rule-enhancer/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
