//! Rule argument bundles - the declarative inputs of one target.
//!
//! Each rule kind gets its own variant holding only its own fields. Code
//! that only cares about one aspect of a bundle (its deps, its timeout,
//! its environment) goes through the capability traits instead of
//! matching on the variant.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;

static NO_ENV: BTreeMap<String, String> = BTreeMap::new();

/// Source language of a JVM library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JvmLanguage {
    Java,
    Kotlin,
}

impl Default for JvmLanguage {
    fn default() -> Self {
        JvmLanguage::Java
    }
}

/// How the test runner forks JVMs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkMode {
    None,
    PerTest,
}

impl Default for ForkMode {
    fn default() -> Self {
        ForkMode::None
    }
}

/// Log level forwarded to the test runner for captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Off,
    Severe,
    Warning,
    Info,
    Config,
    Fine,
    Finer,
    Finest,
    All,
}

/// Arguments shared by every JVM library-shaped rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryArgs {
    /// Target this bundle describes
    pub name: BuildTarget,

    /// Source files
    #[serde(default)]
    pub srcs: BTreeSet<String>,

    /// Resource files packaged with the library
    #[serde(default)]
    pub resources: BTreeSet<String>,

    /// Declared dependencies
    #[serde(default)]
    pub deps: DepSet,

    /// Dependencies re-exported to dependents
    #[serde(default)]
    pub exported_deps: DepSet,

    /// Compile-only dependencies
    #[serde(default)]
    pub provided_deps: DepSet,

    /// Source language
    #[serde(default)]
    pub language: JvmLanguage,

    /// `-source` override
    #[serde(default)]
    pub source_level: Option<String>,

    /// `-target` override
    #[serde(default)]
    pub target_level: Option<String>,

    /// Additional compiler arguments
    #[serde(default)]
    pub extra_arguments: Vec<String>,

    /// Annotation processor classes
    #[serde(default)]
    pub annotation_processors: BTreeSet<String>,

    /// Package used when merging resources into one `R` class
    #[serde(default)]
    pub resource_union_package: Option<String>,

    /// Name of the generated `R` class
    #[serde(default)]
    pub final_r_name: Option<String>,
}

impl LibraryArgs {
    /// Create library arguments with nothing but a name.
    pub fn new(name: BuildTarget) -> Self {
        LibraryArgs {
            name,
            srcs: BTreeSet::new(),
            resources: BTreeSet::new(),
            deps: DepSet::new(),
            exported_deps: DepSet::new(),
            provided_deps: DepSet::new(),
            language: JvmLanguage::default(),
            source_level: None,
            target_level: None,
            extra_arguments: Vec::new(),
            annotation_processors: BTreeSet::new(),
            resource_union_package: None,
            final_r_name: None,
        }
    }

    /// Set source files.
    pub fn with_srcs(mut self, srcs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.srcs = srcs.into_iter().map(Into::into).collect();
        self
    }

    /// Set declared dependencies.
    pub fn with_deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.deps = deps.into_iter().collect();
        self
    }

    /// Set exported dependencies.
    pub fn with_exported_deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.exported_deps = deps.into_iter().collect();
        self
    }

    /// Set compile-only dependencies.
    pub fn with_provided_deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.provided_deps = deps.into_iter().collect();
        self
    }

    /// Set the source language.
    pub fn with_language(mut self, language: JvmLanguage) -> Self {
        self.language = language;
        self
    }
}

/// Arguments of a Robolectric test target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestArgs {
    #[serde(flatten)]
    pub library: LibraryArgs,

    #[serde(default)]
    pub labels: BTreeSet<String>,

    #[serde(default)]
    pub contacts: BTreeSet<String>,

    /// Extra JVM arguments for the test process
    #[serde(default)]
    pub vm_args: Vec<String>,

    /// Environment of the test process; values may contain macros
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Timeout for the whole test rule
    #[serde(default)]
    pub test_rule_timeout_ms: Option<u64>,

    /// Timeout for each test case
    #[serde(default)]
    pub test_case_timeout_ms: Option<u64>,

    #[serde(default)]
    pub run_test_separately: bool,

    #[serde(default)]
    pub fork_mode: ForkMode,

    #[serde(default)]
    pub std_out_log_level: Option<LogLevel>,

    #[serde(default)]
    pub std_err_log_level: Option<LogLevel>,

    /// Expose native libraries from the dependency graph to the test JVM
    #[serde(default)]
    pub use_cxx_libraries: bool,

    /// Native libraries allowed through when `use_cxx_libraries` is set;
    /// empty admits all of them
    #[serde(default)]
    pub cxx_library_whitelist: DepSet,

    #[serde(default)]
    pub robolectric_runtime_dependency: Option<String>,

    #[serde(default)]
    pub robolectric_manifest: Option<String>,

    #[serde(default = "default_true")]
    pub force_final_resource_ids: bool,

    #[serde(default)]
    pub use_old_styleable_format: bool,
}

fn default_true() -> bool {
    true
}

impl TestArgs {
    /// Create test arguments with defaults around the given library args.
    pub fn new(library: LibraryArgs) -> Self {
        TestArgs {
            library,
            labels: BTreeSet::new(),
            contacts: BTreeSet::new(),
            vm_args: Vec::new(),
            env: BTreeMap::new(),
            test_rule_timeout_ms: None,
            test_case_timeout_ms: None,
            run_test_separately: false,
            fork_mode: ForkMode::default(),
            std_out_log_level: None,
            std_err_log_level: None,
            use_cxx_libraries: false,
            cxx_library_whitelist: DepSet::new(),
            robolectric_runtime_dependency: None,
            robolectric_manifest: None,
            force_final_resource_ids: true,
            use_old_styleable_format: false,
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the per-target rule timeout.
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.test_rule_timeout_ms = Some(timeout);
        self
    }

    /// Opt into native library exposure.
    pub fn with_cxx_libraries(mut self, whitelist: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.use_cxx_libraries = true;
        self.cxx_library_whitelist = whitelist.into_iter().collect();
        self
    }
}

/// Argument bundle for one target, tagged by rule kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleArgs {
    AndroidLibrary(LibraryArgs),
    RobolectricTest(TestArgs),
}

impl RuleArgs {
    /// Get the target the bundle describes.
    pub fn target(&self) -> BuildTarget {
        self.library().name
    }

    /// Get the library-shaped part of the bundle.
    pub fn library(&self) -> &LibraryArgs {
        match self {
            RuleArgs::AndroidLibrary(args) => args,
            RuleArgs::RobolectricTest(args) => &args.library,
        }
    }

    /// Get the test arguments, if this is a test target.
    pub fn test(&self) -> Option<&TestArgs> {
        match self {
            RuleArgs::AndroidLibrary(_) => None,
            RuleArgs::RobolectricTest(args) => Some(args),
        }
    }

    pub fn is_test(&self) -> bool {
        self.test().is_some()
    }

    /// Rule kind name as used in target files.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RuleArgs::AndroidLibrary(_) => "android_library",
            RuleArgs::RobolectricTest(_) => "robolectric_test",
        }
    }
}

/// Native-interop request carried by a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeCapabilities {
    /// Whether the bundle opted in
    pub requested: bool,
    /// Eligible native libraries; empty means all
    pub allow_list: DepSet,
}

impl NativeCapabilities {
    /// Check whether `target` passes the allow-list.
    pub fn allows(&self, target: &BuildTarget) -> bool {
        self.allow_list.is_empty() || self.allow_list.contains(&target.unflavored())
    }
}

/// Bundles that declare dependencies.
pub trait HasDeclaredDeps {
    fn declared_deps(&self) -> &DepSet;
    fn exported_deps(&self) -> &DepSet;
}

/// Bundles that may carry a rule timeout.
pub trait HasTimeout {
    fn timeout_ms(&self) -> Option<u64>;
}

/// Bundles with a (macro-bearing) environment map.
pub trait HasEnv {
    fn env(&self) -> &BTreeMap<String, String>;
}

/// Bundles that can request native-library exposure.
pub trait HasNativeInterop {
    fn native_capabilities(&self) -> NativeCapabilities;
}

impl HasDeclaredDeps for LibraryArgs {
    fn declared_deps(&self) -> &DepSet {
        &self.deps
    }

    fn exported_deps(&self) -> &DepSet {
        &self.exported_deps
    }
}

impl HasDeclaredDeps for TestArgs {
    fn declared_deps(&self) -> &DepSet {
        &self.library.deps
    }

    fn exported_deps(&self) -> &DepSet {
        &self.library.exported_deps
    }
}

impl HasTimeout for TestArgs {
    fn timeout_ms(&self) -> Option<u64> {
        self.test_rule_timeout_ms
    }
}

impl HasEnv for TestArgs {
    fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl HasNativeInterop for TestArgs {
    fn native_capabilities(&self) -> NativeCapabilities {
        NativeCapabilities {
            requested: self.use_cxx_libraries,
            allow_list: self.cxx_library_whitelist.clone(),
        }
    }
}

impl HasDeclaredDeps for RuleArgs {
    fn declared_deps(&self) -> &DepSet {
        self.library().declared_deps()
    }

    fn exported_deps(&self) -> &DepSet {
        self.library().exported_deps()
    }
}

impl HasTimeout for RuleArgs {
    fn timeout_ms(&self) -> Option<u64> {
        self.test().and_then(HasTimeout::timeout_ms)
    }
}

impl HasEnv for RuleArgs {
    fn env(&self) -> &BTreeMap<String, String> {
        match self.test() {
            Some(test) => test.env(),
            None => &NO_ENV,
        }
    }
}

impl HasNativeInterop for RuleArgs {
    fn native_capabilities(&self) -> NativeCapabilities {
        self.test()
            .map(HasNativeInterop::native_capabilities)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    #[test]
    fn test_capabilities_through_rule_args() {
        let lib = LibraryArgs::new(t("//app:lib")).with_deps([t("//dep:a")]);
        let library = RuleArgs::AndroidLibrary(lib.clone());
        let test = RuleArgs::RobolectricTest(
            TestArgs::new(lib)
                .with_env("DATA", "$(location //data:blob)")
                .with_timeout_ms(500),
        );

        assert_eq!(library.declared_deps().len(), 1);
        assert!(library.env().is_empty());
        assert_eq!(library.timeout_ms(), None);
        assert!(!library.native_capabilities().requested);

        assert_eq!(test.env().len(), 1);
        assert_eq!(test.timeout_ms(), Some(500));
        assert!(test.is_test());
    }

    #[test]
    fn test_allow_list() {
        let open = NativeCapabilities {
            requested: true,
            allow_list: DepSet::new(),
        };
        assert!(open.allows(&t("//native:any")));

        let closed = NativeCapabilities {
            requested: true,
            allow_list: DepSet::single(t("//native:yes")),
        };
        assert!(closed.allows(&t("//native:yes")));
        assert!(!closed.allows(&t("//native:no")));
    }

    #[test]
    fn test_deserialize_test_args_from_toml() {
        let args: RuleArgs = toml::from_str(
            r#"
            kind = "robolectric_test"
            name = "//app:test"
            srcs = ["FooTest.java"]
            deps = ["//app:lib"]
            fork_mode = "per_test"
            std_err_log_level = "WARNING"

            [env]
            DATA = "$(location :fixtures)"
            "#,
        )
        .unwrap();

        let test = args.test().unwrap();
        assert_eq!(args.target(), t("//app:test"));
        assert_eq!(test.fork_mode, ForkMode::PerTest);
        assert_eq!(test.std_err_log_level, Some(LogLevel::Warning));
        assert!(test.force_final_resource_ids);
        assert!(!test.use_old_styleable_format);
        assert_eq!(test.env["DATA"], "$(location :fixtures)");
    }
}
