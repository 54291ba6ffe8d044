//! Target universe - what is known about targets outside the one being
//! enhanced.
//!
//! The enhancement pipeline only needs to know the kind of each reachable
//! target and its outgoing edges. Where that information comes from (a
//! parsed build file, a daemon's cache) is up to the implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::dep_set::DepSet;
use crate::core::target::BuildTarget;
use crate::enhance::errors::{Component, EnhanceError};

/// Rule kind of a target in the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    AndroidResource,
    JavaLibrary,
    AndroidLibrary,
    CxxLibrary,
    PrebuiltCxxLibrary,
    PrebuiltJar,
    RobolectricTest,
}

impl DependencyKind {
    /// Contributes Android resources to an `R` class.
    pub fn is_resource_bearing(&self) -> bool {
        matches!(self, DependencyKind::AndroidResource)
    }

    /// Provides native code that can be loaded into a JVM.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            DependencyKind::CxxLibrary | DependencyKind::PrebuiltCxxLibrary
        )
    }

    /// Compiles to (or ships) a jar at the conventional location.
    pub fn produces_jar(&self) -> bool {
        matches!(
            self,
            DependencyKind::JavaLibrary
                | DependencyKind::AndroidLibrary
                | DependencyKind::AndroidResource
                | DependencyKind::PrebuiltJar
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::AndroidResource => "android_resource",
            DependencyKind::JavaLibrary => "java_library",
            DependencyKind::AndroidLibrary => "android_library",
            DependencyKind::CxxLibrary => "cxx_library",
            DependencyKind::PrebuiltCxxLibrary => "prebuilt_cxx_library",
            DependencyKind::PrebuiltJar => "prebuilt_jar",
            DependencyKind::RobolectricTest => "robolectric_test",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a dependency scan reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// Only the listed dependencies
    FirstOrder,
    /// The listed dependencies and everything they reach
    #[default]
    Transitive,
}

/// What the universe knows about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetEntry {
    pub target: BuildTarget,
    pub kind: DependencyKind,
    pub deps: DepSet,
    pub exported_deps: DepSet,
}

impl TargetEntry {
    pub fn new(target: BuildTarget, kind: DependencyKind) -> Self {
        TargetEntry {
            target,
            kind,
            deps: DepSet::new(),
            exported_deps: DepSet::new(),
        }
    }

    pub fn with_deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.deps = deps.into_iter().collect();
        self
    }

    pub fn with_exported_deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
        self.exported_deps = deps.into_iter().collect();
        self
    }

    /// Outgoing edges: deps and exported deps.
    pub fn edges(&self) -> impl Iterator<Item = &BuildTarget> + '_ {
        self.deps.iter().chain(self.exported_deps.iter())
    }
}

/// A source of target information.
pub trait TargetUniverse: Send + Sync {
    /// Look up a target. `None` if it is not known.
    fn resolve(&self, target: &BuildTarget) -> Option<Arc<TargetEntry>>;
}

/// Universe held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUniverse {
    entries: BTreeMap<BuildTarget, Arc<TargetEntry>>,
}

impl InMemoryUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any previous entry for the same target.
    pub fn insert(&mut self, entry: TargetEntry) {
        self.entries.insert(entry.target, Arc::new(entry));
    }

    pub fn with(mut self, entry: TargetEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TargetEntry> + '_ {
        self.entries.values().map(|e| e.as_ref())
    }
}

impl TargetUniverse for InMemoryUniverse {
    fn resolve(&self, target: &BuildTarget) -> Option<Arc<TargetEntry>> {
        self.entries.get(target).cloned()
    }
}

/// Resolve `roots` and, in transitive mode, everything reachable from them.
///
/// Returns the entries found, keyed and ordered by target. An unknown
/// target anywhere in the walk is a `MissingDependency` charged to
/// `requester`.
pub fn scan(
    universe: &dyn TargetUniverse,
    roots: impl IntoIterator<Item = BuildTarget>,
    mode: DependencyMode,
    requester: BuildTarget,
    component: Component,
) -> Result<BTreeMap<BuildTarget, Arc<TargetEntry>>, EnhanceError> {
    let mut found = BTreeMap::new();
    let mut visited = BTreeSet::new();
    let mut stack: Vec<BuildTarget> = roots.into_iter().collect();
    stack.reverse();

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }

        let entry = universe
            .resolve(&current)
            .ok_or(EnhanceError::MissingDependency {
                requester,
                missing: current,
                component,
            })?;

        if mode == DependencyMode::Transitive {
            let mut edges: Vec<BuildTarget> = entry.edges().copied().collect();
            edges.reverse();
            stack.extend(edges.into_iter().filter(|e| !visited.contains(e)));
        }

        found.insert(current, entry);
    }

    Ok(found)
}
