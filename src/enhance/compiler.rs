//! JVM library compilers.
//!
//! Compiler options start from the process-wide template and are refined
//! per target. Each language decides how the toolchain is invoked and
//! whether class usage is tracked; both put the Android boot classpath in
//! front of the platform one.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::args::{JvmLanguage, LibraryArgs};

/// Options handed to `javac` (and to `kotlinc` for its Java half).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// `-source` level
    pub source_level: String,

    /// `-target` level
    pub target_level: String,

    /// Boot classpath entries, in order
    pub boot_classpath: Vec<PathBuf>,

    /// Additional compiler arguments
    pub extra_arguments: Vec<String>,

    /// Annotation processor classes
    pub annotation_processors: BTreeSet<String>,

    /// Record which classes of the classpath were actually read
    pub track_class_usage: bool,

    /// Folder for sources generated by annotation processors
    pub generated_source_folder: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            source_level: "7".to_string(),
            target_level: "7".to_string(),
            boot_classpath: Vec::new(),
            extra_arguments: Vec::new(),
            annotation_processors: BTreeSet::new(),
            track_class_usage: true,
            generated_source_folder: Some("__gen__".to_string()),
        }
    }
}

impl CompilerOptions {
    /// Refine the template with per-target overrides.
    pub fn for_target(template: &CompilerOptions, args: &LibraryArgs) -> Self {
        let mut extra_arguments = template.extra_arguments.clone();
        extra_arguments.extend(args.extra_arguments.iter().cloned());

        CompilerOptions {
            source_level: args
                .source_level
                .clone()
                .unwrap_or_else(|| template.source_level.clone()),
            target_level: args
                .target_level
                .clone()
                .unwrap_or_else(|| template.target_level.clone()),
            boot_classpath: template.boot_classpath.clone(),
            extra_arguments,
            annotation_processors: template
                .annotation_processors
                .union(&args.annotation_processors)
                .cloned()
                .collect(),
            track_class_usage: template.track_class_usage,
            generated_source_folder: template.generated_source_folder.clone(),
        }
    }
}

/// Puts the Android platform jars ahead of the JDK boot classpath.
#[derive(Debug, Clone, Default)]
pub struct BootClasspathAppender {
    android_boot_classpath: Vec<PathBuf>,
}

impl BootClasspathAppender {
    pub fn new(android_boot_classpath: Vec<PathBuf>) -> Self {
        BootClasspathAppender {
            android_boot_classpath,
        }
    }

    pub fn amend(&self, options: &CompilerOptions) -> CompilerOptions {
        let mut boot_classpath = self.android_boot_classpath.clone();
        for entry in &options.boot_classpath {
            if !boot_classpath.contains(entry) {
                boot_classpath.push(entry.clone());
            }
        }
        CompilerOptions {
            boot_classpath,
            ..options.clone()
        }
    }
}

/// How the toolchain is to be invoked for one library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "compiler", rename_all = "lowercase")]
pub enum CompilerInvocation {
    Javac { options: CompilerOptions },
    Kotlinc { kotlinc: PathBuf, options: CompilerOptions },
}

impl CompilerInvocation {
    pub fn options(&self) -> &CompilerOptions {
        match self {
            CompilerInvocation::Javac { options } | CompilerInvocation::Kotlinc { options, .. } => {
                options
            }
        }
    }
}

/// A language-specific library compiler.
pub trait LibraryCompiler: Send + Sync {
    fn language(&self) -> JvmLanguage;

    /// Whether the compile records class usage for dependency pruning.
    fn track_class_usage(&self, options: &CompilerOptions) -> bool;

    /// Build the invocation for already-refined options.
    fn invocation(&self, options: &CompilerOptions) -> CompilerInvocation;
}

#[derive(Debug, Clone, Default)]
pub struct JavaLibraryCompiler {
    amender: BootClasspathAppender,
}

impl JavaLibraryCompiler {
    pub fn new(amender: BootClasspathAppender) -> Self {
        JavaLibraryCompiler { amender }
    }
}

impl LibraryCompiler for JavaLibraryCompiler {
    fn language(&self) -> JvmLanguage {
        JvmLanguage::Java
    }

    fn track_class_usage(&self, options: &CompilerOptions) -> bool {
        options.track_class_usage
    }

    fn invocation(&self, options: &CompilerOptions) -> CompilerInvocation {
        CompilerInvocation::Javac {
            options: self.amender.amend(options),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KotlinLibraryCompiler {
    kotlinc: PathBuf,
    amender: BootClasspathAppender,
}

impl KotlinLibraryCompiler {
    pub fn new(kotlinc: impl Into<PathBuf>, amender: BootClasspathAppender) -> Self {
        KotlinLibraryCompiler {
            kotlinc: kotlinc.into(),
            amender,
        }
    }
}

impl LibraryCompiler for KotlinLibraryCompiler {
    fn language(&self) -> JvmLanguage {
        JvmLanguage::Kotlin
    }

    // kotlinc output cannot be mapped back to classpath entries
    fn track_class_usage(&self, _options: &CompilerOptions) -> bool {
        false
    }

    fn invocation(&self, options: &CompilerOptions) -> CompilerInvocation {
        CompilerInvocation::Kotlinc {
            kotlinc: self.kotlinc.clone(),
            options: self.amender.amend(options),
        }
    }
}

/// Pick the compiler for a library's language.
pub fn compiler_for(
    language: JvmLanguage,
    kotlinc: &std::path::Path,
    android_boot_classpath: &[PathBuf],
) -> Box<dyn LibraryCompiler> {
    let amender = BootClasspathAppender::new(android_boot_classpath.to_vec());
    match language {
        JvmLanguage::Java => Box::new(JavaLibraryCompiler::new(amender)),
        JvmLanguage::Kotlin => Box::new(KotlinLibraryCompiler::new(kotlinc, amender)),
    }
}
