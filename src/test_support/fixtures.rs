//! Test fixtures for common enhancement scenarios.
//!
//! Universes are assembled with a small builder; target files are kept as
//! TOML strings so the same content can be written to disk by ops tests.

use crate::core::universe::{DependencyKind, InMemoryUniverse, TargetEntry};

use super::t;

/// Builder for an `InMemoryUniverse`.
#[derive(Debug, Clone, Default)]
pub struct FixtureUniverse {
    universe: InMemoryUniverse,
}

impl FixtureUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(mut self, label: &str, kind: DependencyKind, deps: &[&str]) -> Self {
        self.universe
            .insert(TargetEntry::new(t(label), kind).with_deps(deps.iter().map(|d| t(d))));
        self
    }

    pub fn java_library(self, label: &str) -> Self {
        self.entry(label, DependencyKind::JavaLibrary, &[])
    }

    pub fn android_library(self, label: &str, deps: &[&str]) -> Self {
        self.entry(label, DependencyKind::AndroidLibrary, deps)
    }

    pub fn android_resource(self, label: &str) -> Self {
        self.entry(label, DependencyKind::AndroidResource, &[])
    }

    pub fn cxx_library(self, label: &str, deps: &[&str]) -> Self {
        self.entry(label, DependencyKind::CxxLibrary, deps)
    }

    pub fn prebuilt_cxx_library(self, label: &str) -> Self {
        self.entry(label, DependencyKind::PrebuiltCxxLibrary, &[])
    }

    pub fn build(self) -> InMemoryUniverse {
        self.universe
    }
}

/// A universe exercising every synthetic node: resources behind an
/// Android library, and a JNI library pulling in two native libraries.
pub fn app_universe() -> InMemoryUniverse {
    FixtureUniverse::new()
        .android_library("//app:lib", &["//res:strings"])
        .android_resource("//res:strings")
        .android_library("//app:jni", &["//native:codec"])
        .cxx_library("//native:codec", &["//native:zlib"])
        .prebuilt_cxx_library("//native:zlib")
        .java_library("//data:fixtures")
        .build()
}

/// Target file with one library, one test and their dependencies.
pub const TARGET_FILE: &str = r#"
[[target]]
kind = "android_resource"
name = "//res:strings"

[[target]]
kind = "cxx_library"
name = "//native:codec"

[[target]]
kind = "android_library"
name = "//app:lib"
srcs = ["src/main/Lib.java"]
deps = ["//res:strings"]

[[target]]
kind = "robolectric_test"
name = "//app:test"
srcs = ["src/test/LibTest.java"]
deps = ["//app:lib", "//native:codec"]
use_cxx_libraries = true
test_rule_timeout_ms = 30000

[target.env]
LIB_JAR = "$(location //app:lib)"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::universe::TargetUniverse;

    #[test]
    fn test_app_universe() {
        let universe = app_universe();
        let codec = universe.resolve(&t("//native:codec")).unwrap();
        assert!(codec.kind.is_native());
        assert_eq!(codec.deps.to_vec(), vec![t("//native:zlib")]);
        assert!(universe.resolve(&t("//app:test")).is_none());
    }
}
