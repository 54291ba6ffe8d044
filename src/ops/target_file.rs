//! Target files - TOML lists of `[[target]]` declarations.
//!
//! ```toml
//! [[target]]
//! kind = "android_library"
//! name = "//app:lib"
//! srcs = ["src/main/Lib.java"]
//! deps = ["//res:strings"]
//!
//! [[target]]
//! kind = "android_resource"
//! name = "//res:strings"
//! ```
//!
//! Library and test declarations become rule argument bundles that can be
//! enhanced; every declaration becomes an entry of the target universe.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::core::args::{HasDeclaredDeps, LibraryArgs, RuleArgs, TestArgs};
use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;
use crate::core::universe::{DependencyKind, InMemoryUniverse, TargetEntry};
use crate::util::diagnostic::suggestions;

/// Conventional target file name.
pub const TARGET_FILE_NAME: &str = "targets.toml";

/// A target the pipeline does not enhance but may depend on.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalDecl {
    pub name: BuildTarget,
    #[serde(default)]
    pub deps: DepSet,
    #[serde(default)]
    pub exported_deps: DepSet,
}

/// One `[[target]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetDecl {
    AndroidLibrary(LibraryArgs),
    RobolectricTest(TestArgs),
    AndroidResource(ExternalDecl),
    JavaLibrary(ExternalDecl),
    CxxLibrary(ExternalDecl),
    PrebuiltCxxLibrary(ExternalDecl),
    PrebuiltJar(ExternalDecl),
}

impl TargetDecl {
    pub fn name(&self) -> BuildTarget {
        match self {
            TargetDecl::AndroidLibrary(args) => args.name,
            TargetDecl::RobolectricTest(args) => args.library.name,
            TargetDecl::AndroidResource(decl)
            | TargetDecl::JavaLibrary(decl)
            | TargetDecl::CxxLibrary(decl)
            | TargetDecl::PrebuiltCxxLibrary(decl)
            | TargetDecl::PrebuiltJar(decl) => decl.name,
        }
    }

    fn kind(&self) -> DependencyKind {
        match self {
            TargetDecl::AndroidLibrary(_) => DependencyKind::AndroidLibrary,
            TargetDecl::RobolectricTest(_) => DependencyKind::RobolectricTest,
            TargetDecl::AndroidResource(_) => DependencyKind::AndroidResource,
            TargetDecl::JavaLibrary(_) => DependencyKind::JavaLibrary,
            TargetDecl::CxxLibrary(_) => DependencyKind::CxxLibrary,
            TargetDecl::PrebuiltCxxLibrary(_) => DependencyKind::PrebuiltCxxLibrary,
            TargetDecl::PrebuiltJar(_) => DependencyKind::PrebuiltJar,
        }
    }

    fn universe_entry(&self) -> TargetEntry {
        let (deps, exported_deps) = match self {
            TargetDecl::AndroidLibrary(args) => (args.declared_deps(), args.exported_deps()),
            TargetDecl::RobolectricTest(args) => (args.declared_deps(), args.exported_deps()),
            TargetDecl::AndroidResource(decl)
            | TargetDecl::JavaLibrary(decl)
            | TargetDecl::CxxLibrary(decl)
            | TargetDecl::PrebuiltCxxLibrary(decl)
            | TargetDecl::PrebuiltJar(decl) => (&decl.deps, &decl.exported_deps),
        };
        TargetEntry::new(self.name(), self.kind())
            .with_deps(deps.iter().copied())
            .with_exported_deps(exported_deps.iter().copied())
    }

    fn into_rule(self) -> Option<RuleArgs> {
        match self {
            TargetDecl::AndroidLibrary(args) => Some(RuleArgs::AndroidLibrary(args)),
            TargetDecl::RobolectricTest(args) => Some(RuleArgs::RobolectricTest(args)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTargetFile {
    #[serde(default, rename = "target")]
    targets: Vec<TargetDecl>,
}

/// A parsed target file.
#[derive(Debug, Clone)]
pub struct TargetSet {
    path: Option<PathBuf>,
    universe: InMemoryUniverse,
    rules: BTreeMap<BuildTarget, RuleArgs>,
}

impl TargetSet {
    /// Load and validate a target file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read target file: {}", path.display()))?;

        let mut set = Self::parse(&contents).map_err(|e| {
            anyhow!(
                "failed to parse target file: {}: {:#}\n{}",
                path.display(),
                e,
                suggestions::BAD_TARGET_FILE
            )
        })?;
        set.path = Some(path.to_path_buf());
        Ok(set)
    }

    /// Parse target file contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let raw: RawTargetFile = toml::from_str(contents)?;

        let mut universe = InMemoryUniverse::new();
        let mut rules = BTreeMap::new();
        let mut seen = BTreeMap::new();

        for decl in raw.targets {
            let name = decl.name();
            if name.is_flavored() {
                bail!("target `{}` is declared with flavors; declare `{}` instead", name, name.unflavored());
            }
            if let Some(previous) = seen.insert(name, decl.kind()) {
                bail!("target `{}` is declared twice (as {} and {})", name, previous, decl.kind());
            }

            universe.insert(decl.universe_entry());
            if let Some(rule) = decl.into_rule() {
                rules.insert(name, rule);
            }
        }

        tracing::debug!(
            "loaded {} targets ({} enhanceable)",
            universe.len(),
            rules.len()
        );

        Ok(TargetSet {
            path: None,
            universe,
            rules,
        })
    }

    /// File this set was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn universe(&self) -> &InMemoryUniverse {
        &self.universe
    }

    /// Arguments of the rule behind `target`, flavors ignored.
    pub fn rule(&self, target: &BuildTarget) -> Option<&RuleArgs> {
        self.rules.get(&target.unflavored())
    }

    /// Enhanceable rules, ordered by target.
    pub fn rules(&self) -> impl Iterator<Item = (&BuildTarget, &RuleArgs)> + '_ {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Locate the target file: the explicit path, or `targets.toml` in `cwd`.
pub fn find_target_file(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd.join(TARGET_FILE_NAME),
    };
    if !path.is_file() {
        bail!(
            "could not find target file {}\n\
             help: Pass `--file <PATH>` or create `{}`",
            path.display(),
            TARGET_FILE_NAME
        );
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::universe::TargetUniverse;
    use crate::test_support::{t, TARGET_FILE};
    use tempfile::TempDir;

    #[test]
    fn test_parse_target_file() {
        let set = TargetSet::parse(TARGET_FILE).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.universe().len(), 4);

        let test = set.rule(&t("//app:test#class-abi")).unwrap();
        assert!(test.is_test());
        assert_eq!(test.test().unwrap().test_rule_timeout_ms, Some(30_000));
        assert_eq!(test.test().unwrap().env["LIB_JAR"], "$(location //app:lib)");

        let entry = set.universe().resolve(&t("//app:test")).unwrap();
        assert_eq!(entry.kind, DependencyKind::RobolectricTest);
        assert_eq!(entry.deps.len(), 2);
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let err = TargetSet::parse(
            r#"
[[target]]
kind = "java_library"
name = "//a:a"

[[target]]
kind = "android_resource"
name = "//a:a"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_flavored_declaration_rejected() {
        let err = TargetSet::parse(
            r#"
[[target]]
kind = "java_library"
name = "//a:a#class-abi"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("flavors"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(TargetSet::parse("[[target]]\nkind = \"genrule\"\nname = \"//a:a\"\n").is_err());
    }

    #[test]
    fn test_find_and_load() {
        let tmp = TempDir::new().unwrap();
        assert!(find_target_file(None, tmp.path()).is_err());

        std::fs::write(tmp.path().join(TARGET_FILE_NAME), TARGET_FILE).unwrap();
        let path = find_target_file(None, tmp.path()).unwrap();
        let set = TargetSet::load(&path).unwrap();
        assert_eq!(set.path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_error_names_file_and_hints() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(TARGET_FILE_NAME);
        std::fs::write(&path, "[[target]]\nkind = \"genrule\"\nname = \"//a:a\"\n").unwrap();

        let message = TargetSet::load(&path).unwrap_err().to_string();
        assert!(message.starts_with("failed to parse target file: "));
        assert!(message.contains("genrule"));
        assert!(message.ends_with(suggestions::BAD_TARGET_FILE));
    }
}
