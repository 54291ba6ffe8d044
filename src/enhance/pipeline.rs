//! The enhancement pipeline.
//!
//! `Enhancer` ties the stages together:
//!
//! 1. dispatch on the requested target's flavors;
//! 2. fold macro-referenced, exported and provided deps into the extra deps;
//! 3. synthesize the generated-resources node;
//! 4. inject the native-library bridge;
//! 5. assemble the library and test nodes.
//!
//! All nodes go through one `NodeRegistry`, so each identifier is built at
//! most once per enhancer however many requests reach it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::core::args::{HasDeclaredDeps, HasEnv, HasNativeInterop, RuleArgs};
use crate::core::dep_set::DepSet;
use crate::core::params::RuleParams;
use crate::core::rule::RuleNode;
use crate::core::target::BuildTarget;
use crate::core::universe::{DependencyMode, TargetUniverse};
use crate::enhance::assemble::{self, Assembled, Assembler};
use crate::enhance::compiler::{compiler_for, CompilerOptions};
use crate::enhance::dispatch::{Dispatch, FlavorDispatcher};
use crate::enhance::errors::{Component, EnhanceError};
use crate::enhance::graph::{EnhancedGraph, RuleGraph};
use crate::enhance::macros::MacroRegistry;
use crate::enhance::native::{NativeBridgeInjector, NativePlatform};
use crate::enhance::registry::{NodeRegistry, RegistryArtifacts};
use crate::enhance::resources::{ResourceEnhancer, ResourceOptions};
use crate::enhance::toolchain::{BuckOutPaths, OutputPathProvider, PlannedToolchain, ToolchainInvoker};

/// Process-wide settings every enhancement reads.
///
/// Taken once when an `Enhancer` is built and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefaults {
    /// Test-rule timeout used when a test does not set its own
    pub test_rule_timeout_ms: Option<u64>,

    /// Template compiler options
    pub compiler_options: CompilerOptions,

    /// Kotlin compiler
    pub kotlinc: PathBuf,

    /// Android platform jars put on the boot classpath
    pub android_boot_classpath: Vec<PathBuf>,

    /// Platform native libraries are bridged for
    pub native_platform: NativePlatform,

    /// How far the resource scan reaches
    pub resource_dependency_mode: DependencyMode,
}

impl Default for ProcessDefaults {
    fn default() -> Self {
        ProcessDefaults {
            test_rule_timeout_ms: None,
            compiler_options: CompilerOptions::default(),
            kotlinc: PathBuf::from("kotlinc"),
            android_boot_classpath: Vec::new(),
            native_platform: NativePlatform::default(),
            resource_dependency_mode: DependencyMode::Transitive,
        }
    }
}

/// Builder for an `Enhancer`. Only the universe is mandatory.
pub struct EnhancerBuilder {
    universe: Arc<dyn TargetUniverse>,
    toolchain: Arc<dyn ToolchainInvoker>,
    paths: Arc<dyn OutputPathProvider>,
    macros: Arc<MacroRegistry>,
    defaults: Arc<ProcessDefaults>,
    registry: Arc<NodeRegistry>,
}

impl EnhancerBuilder {
    pub fn toolchain(mut self, toolchain: Arc<dyn ToolchainInvoker>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn paths(mut self, paths: Arc<dyn OutputPathProvider>) -> Self {
        self.paths = paths;
        self
    }

    pub fn macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = Arc::new(macros);
        self
    }

    pub fn defaults(mut self, defaults: ProcessDefaults) -> Self {
        self.defaults = Arc::new(defaults);
        self
    }

    /// Share a registry with other enhancers.
    pub fn registry(mut self, registry: Arc<NodeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Enhancer {
        Enhancer {
            universe: self.universe,
            toolchain: self.toolchain,
            paths: self.paths,
            macros: self.macros,
            defaults: self.defaults,
            registry: self.registry,
        }
    }
}

/// Expands rule argument bundles into rule nodes.
pub struct Enhancer {
    universe: Arc<dyn TargetUniverse>,
    toolchain: Arc<dyn ToolchainInvoker>,
    paths: Arc<dyn OutputPathProvider>,
    macros: Arc<MacroRegistry>,
    defaults: Arc<ProcessDefaults>,
    registry: Arc<NodeRegistry>,
}

impl Enhancer {
    /// Start building an enhancer that plans into `buck-out`.
    pub fn builder(universe: Arc<dyn TargetUniverse>) -> EnhancerBuilder {
        EnhancerBuilder {
            universe,
            toolchain: Arc::new(PlannedToolchain),
            paths: Arc::new(BuckOutPaths::new("buck-out")),
            macros: Arc::new(MacroRegistry::new()),
            defaults: Arc::new(ProcessDefaults::default()),
            registry: Arc::new(NodeRegistry::new()),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn defaults(&self) -> &ProcessDefaults {
        &self.defaults
    }

    pub fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    /// Enhance `target` and return the graph reachable from it.
    ///
    /// `args` describes the un-flavored form of `target`.
    pub fn enhance(
        &self,
        target: BuildTarget,
        args: &RuleArgs,
    ) -> Result<EnhancedGraph, EnhanceError> {
        self.enhance_node(target, args)?;
        Ok(EnhancedGraph::from_registry(&self.registry, target))
    }

    /// Enhance many targets in parallel.
    ///
    /// Graphs are snapshotted after every target is built, so each one sees
    /// the nodes of all the others. The first error aborts the batch.
    pub fn enhance_all(
        &self,
        requests: &[(BuildTarget, RuleArgs)],
    ) -> Result<Vec<EnhancedGraph>, EnhanceError> {
        requests
            .par_iter()
            .map(|(target, args)| self.enhance_node(*target, args))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests
            .iter()
            .map(|(target, _)| EnhancedGraph::from_registry(&self.registry, *target))
            .collect())
    }

    /// Enhance `target` and return its node.
    pub fn enhance_node(
        &self,
        target: BuildTarget,
        args: &RuleArgs,
    ) -> Result<Arc<RuleNode>, EnhanceError> {
        debug_assert_eq!(target.unflavored(), args.target(), "arguments describe another target");

        if let Some(node) = self.registry.get(&target) {
            tracing::trace!("{} already enhanced", target);
            return Ok(node);
        }

        let dispatcher = FlavorDispatcher::new(&self.registry, self.paths.as_ref());
        match dispatcher.dispatch(target, args, |base| self.enhance_node(base, args))? {
            Dispatch::Abi(node) => Ok(node),
            Dispatch::Enhance(request) => {
                let assembled = self.enhance_main(request.args)?;
                if request.target == request.args.target() {
                    return Ok(Arc::clone(assembled.main()));
                }
                // a derived flavor: only there if the main path produced it
                self.registry
                    .get(&request.target)
                    .ok_or(EnhanceError::MissingDependency {
                        requester: request.args.target(),
                        missing: request.target,
                        component: Component::FlavorDispatcher,
                    })
            }
        }
    }

    /// Targets referenced by macros in the bundle's string arguments.
    pub fn extract_macro_deps(&self, args: &RuleArgs) -> Result<DepSet, EnhanceError> {
        let owner = args.target();
        let mut deps = DepSet::new();
        for raw in args.env().values() {
            deps.extend(self.macros.extract_deps(&owner, raw)?.iter().copied());
        }
        Ok(deps)
    }

    fn enhance_main(&self, args: &RuleArgs) -> Result<Assembled, EnhanceError> {
        let target = args.target();
        tracing::debug!("enhancing {} {}", args.kind_name(), target);

        let library = args.library();

        // macro deps must be known before anything is built; provided deps
        // are compile-only, so they never become declared deps
        let extra_deps = self
            .extract_macro_deps(args)?
            .union(args.exported_deps())
            .union(&library.provided_deps);
        let params = RuleParams::new(target, args.declared_deps().clone(), extra_deps);

        let options = CompilerOptions::for_target(&self.defaults.compiler_options, library);
        let compiler = compiler_for(
            library.language,
            &self.defaults.kotlinc,
            &self.defaults.android_boot_classpath,
        );

        let bundle = ResourceEnhancer::new(
            self.universe.as_ref(),
            &self.registry,
            self.defaults.resource_dependency_mode,
        )
        .enhance(
            target,
            &params,
            &ResourceOptions::from_args(args),
            args.is_test(),
        )?;

        let bundle = NativeBridgeInjector::new(
            self.universe.as_ref(),
            &self.registry,
            self.paths.as_ref(),
            &self.defaults.native_platform,
        )
        .maybe_inject(target, bundle, &args.native_capabilities())?;

        Assembler::new(self.toolchain.as_ref(), &self.registry).assemble(
            args,
            &bundle,
            compiler.as_ref(),
            &options,
            self.defaults.test_rule_timeout_ms,
        )
    }

    /// Runtime environment of a test node with every macro substituted.
    pub fn materialize_env(&self, node: &RuleNode) -> Result<BTreeMap<String, String>, EnhanceError> {
        let artifacts =
            RegistryArtifacts::new(&self.registry, self.universe.as_ref(), self.paths.as_ref());
        assemble::materialize_env(node, &self.macros, &artifacts)
    }

    /// Graph over every node built so far.
    pub fn rule_graph(&self) -> RuleGraph {
        RuleGraph::from_registry(&self.registry)
    }
}
