//! Graph enhancement - synthesizing the generated-resources node.
//!
//! Android libraries that reach resource rules get a `dummy_r_dot_java`
//! node which produces placeholder `R` classes for compilation. Test
//! targets always get one so that the test runner finds an `R` class even
//! without resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::args::RuleArgs;
use crate::core::dep_set::DepSet;
use crate::core::flavor::Flavor;
use crate::core::params::RuleParams;
use crate::core::rule::{ResourcesPayload, RuleNode, RulePayload};
use crate::core::target::BuildTarget;
use crate::core::universe::{self, TargetUniverse};
use crate::enhance::errors::{Component, EnhanceError};
use crate::enhance::registry::NodeRegistry;
use crate::enhance::toolchain::CompiledArtifactRef;

pub use crate::core::universe::DependencyMode;

/// Resource flags carried through to the generated node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceOptions {
    pub force_final_resource_ids: bool,
    pub use_old_styleable_format: bool,
    pub resource_union_package: Option<String>,
    pub final_r_name: Option<String>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        ResourceOptions {
            force_final_resource_ids: true,
            use_old_styleable_format: false,
            resource_union_package: None,
            final_r_name: None,
        }
    }
}

impl ResourceOptions {
    pub fn from_args(args: &RuleArgs) -> Self {
        let library = args.library();
        let mut options = ResourceOptions {
            resource_union_package: library.resource_union_package.clone(),
            final_r_name: library.final_r_name.clone(),
            ..ResourceOptions::default()
        };
        if let Some(test) = args.test() {
            options.force_final_resource_ids = test.force_final_resource_ids;
            options.use_old_styleable_format = test.use_old_styleable_format;
        }
        options
    }
}

/// Params of a target after synthetic nodes were added, along with the
/// nodes themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedBundle {
    pub params: RuleParams,
    pub resource_node: Option<Arc<RuleNode>>,
    pub native_node: Option<Arc<RuleNode>>,
    /// Environment contributed by injected capabilities
    pub native_env: BTreeMap<String, String>,
}

impl EnhancedBundle {
    /// A bundle with no synthetic nodes.
    pub fn unchanged(params: RuleParams) -> Self {
        EnhancedBundle {
            params,
            resource_node: None,
            native_node: None,
            native_env: BTreeMap::new(),
        }
    }

    /// Deps to look up in the target universe.
    pub fn universe_deps(&self) -> Vec<BuildTarget> {
        universe_deps(&self.params)
    }
}

/// The universe only knows base targets, so a flavored dep is checked
/// through its base. The owner's own synthetic nodes are skipped: the
/// owner is the target being enhanced, not a dependency.
fn universe_deps(params: &RuleParams) -> Vec<BuildTarget> {
    let owner = params.target().unflavored();
    let bases: DepSet = params
        .all_deps()
        .into_iter()
        .map(|dep| dep.unflavored())
        .filter(|base| *base != owner)
        .collect();
    bases.to_vec()
}

pub struct ResourceEnhancer<'a> {
    universe: &'a dyn TargetUniverse,
    registry: &'a NodeRegistry,
    mode: DependencyMode,
}

impl<'a> ResourceEnhancer<'a> {
    pub fn new(
        universe: &'a dyn TargetUniverse,
        registry: &'a NodeRegistry,
        mode: DependencyMode,
    ) -> Self {
        ResourceEnhancer {
            universe,
            registry,
            mode,
        }
    }

    /// Add the generated-resources node to `params` when `target` reaches
    /// resource rules, or unconditionally when `create_if_empty` is set.
    pub fn enhance(
        &self,
        target: BuildTarget,
        params: &RuleParams,
        options: &ResourceOptions,
        create_if_empty: bool,
    ) -> Result<EnhancedBundle, EnhanceError> {
        let reachable = universe::scan(
            self.universe,
            universe_deps(params),
            self.mode,
            target,
            Component::GraphEnhancer,
        )?;

        let resource_deps: DepSet = reachable
            .values()
            .filter(|entry| entry.kind.is_resource_bearing())
            .map(|entry| entry.target)
            .collect();

        if resource_deps.is_empty() && !create_if_empty {
            tracing::trace!("{} reaches no resources", target);
            return Ok(EnhancedBundle::unchanged(params.clone()));
        }

        let key = target.with_flavor(Flavor::DummyRDotJava);
        let node = self.registry.get_or_try_insert_with(key, || {
            tracing::debug!(
                "synthesizing {} over {} resource deps",
                key,
                resource_deps.len()
            );
            Ok(RuleNode {
                target: key,
                declared_deps: resource_deps.clone(),
                extra_deps: DepSet::new(),
                output: Some(CompiledArtifactRef::jar_for(key)),
                payload: RulePayload::Resources(ResourcesPayload {
                    resource_deps: resource_deps.clone(),
                    force_final_resource_ids: options.force_final_resource_ids,
                    use_old_styleable_format: options.use_old_styleable_format,
                    resource_union_package: options.resource_union_package.clone(),
                    final_r_name: options.final_r_name.clone(),
                }),
            })
        })?;

        Ok(EnhancedBundle {
            params: params.appending_declared_deps(&DepSet::single(key)),
            resource_node: Some(node),
            native_node: None,
            native_env: BTreeMap::new(),
        })
    }
}
