//! Node registry - the arena every enhanced node lives in.
//!
//! One slot per target identifier. A slot is filled at most once, even when
//! several threads ask for the same target at the same time: the losers
//! block on the slot and then share the winner's node.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::core::rule::RuleNode;
use crate::core::target::BuildTarget;
use crate::core::universe::TargetUniverse;
use crate::enhance::errors::EnhanceError;
use crate::enhance::macros::ArtifactResolver;
use crate::enhance::toolchain::{CompiledArtifactRef, OutputPathProvider};

type Slot = Arc<OnceCell<Arc<RuleNode>>>;

/// Concurrent, memoizing store of rule nodes keyed by target.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    slots: DashMap<BuildTarget, Slot>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an already constructed node.
    pub fn get(&self, target: &BuildTarget) -> Option<Arc<RuleNode>> {
        self.slots
            .get(target)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.get(target).is_some()
    }

    /// Return the node for `target`, constructing it with `build` if no
    /// node exists yet.
    ///
    /// `build` runs at most once per target for the lifetime of the
    /// registry unless it fails, in which case the slot stays empty and a
    /// later call may try again. It must not ask for `target` itself.
    pub fn get_or_try_insert_with<F>(
        &self,
        target: BuildTarget,
        build: F,
    ) -> Result<Arc<RuleNode>, EnhanceError>
    where
        F: FnOnce() -> Result<RuleNode, EnhanceError>,
    {
        // Clone the slot out so no map shard stays locked while `build`
        // recursively asks for other targets.
        let slot: Slot = Arc::clone(&self.slots.entry(target).or_default());

        if let Some(node) = slot.get() {
            tracing::trace!("reusing node {}", target);
            return Ok(Arc::clone(node));
        }

        slot.get_or_try_init(|| {
            let node = build()?;
            debug_assert_eq!(node.target, target, "node built under the wrong key");
            tracing::debug!(
                "constructed {} node {} ({} deps)",
                node.kind(),
                target,
                node.deps().len()
            );
            Ok(Arc::new(node))
        })
        .cloned()
    }

    /// Number of constructed nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All constructed nodes, ordered by target.
    pub fn nodes(&self) -> BTreeMap<BuildTarget, Arc<RuleNode>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.get().map(|node| (*slot.key(), Arc::clone(node))))
            .collect()
    }

    /// `root` and every constructed node reachable from it, ordered by
    /// target. Edges to targets without a node (universe targets that were
    /// never enhanced) are not followed.
    pub fn closure(&self, root: &BuildTarget) -> BTreeMap<BuildTarget, Arc<RuleNode>> {
        let mut found = BTreeMap::new();
        let mut visited = BTreeSet::new();
        let mut stack = vec![*root];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.get(&current) {
                stack.extend(node.deps().into_iter().filter(|d| !visited.contains(d)));
                found.insert(current, node);
            }
        }

        found
    }
}

/// Resolves macro artifacts from the outputs of registered nodes.
///
/// A target without a node falls back to the universe: jar-producing
/// kinds are found at their conventional location, anything else has no
/// artifact.
pub struct RegistryArtifacts<'a> {
    registry: &'a NodeRegistry,
    universe: &'a dyn TargetUniverse,
    paths: &'a dyn OutputPathProvider,
}

impl<'a> RegistryArtifacts<'a> {
    pub fn new(
        registry: &'a NodeRegistry,
        universe: &'a dyn TargetUniverse,
        paths: &'a dyn OutputPathProvider,
    ) -> Self {
        RegistryArtifacts {
            registry,
            universe,
            paths,
        }
    }
}

impl ArtifactResolver for RegistryArtifacts<'_> {
    fn artifact_path(&self, target: &BuildTarget) -> Option<PathBuf> {
        if let Some(node) = self.registry.get(target) {
            return node.output.as_ref().map(|output| self.paths.output_path(output));
        }
        if target.is_flavored() {
            return None;
        }

        let entry = self.universe.resolve(target)?;
        if !entry.kind.produces_jar() {
            tracing::trace!("{} ({}) has no jar output", target, entry.kind);
            return None;
        }
        Some(self.paths.output_path(&CompiledArtifactRef::jar_for(*target)))
    }
}
