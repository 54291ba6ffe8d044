//! Library and test assembly.
//!
//! Every target gets a compiled library node. A test target's library lives
//! at `T#compiled-tests` and the runnable test node at `T` depends on it
//! alone; whatever the library needed becomes the test's extra deps.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::args::{HasTimeout, RuleArgs};
use crate::core::dep_set::DepSet;
use crate::core::flavor::Flavor;
use crate::core::rule::{LibraryPayload, RuleNode, RulePayload, TestPayload};
use crate::enhance::compiler::{CompilerOptions, LibraryCompiler};
use crate::enhance::errors::EnhanceError;
use crate::enhance::macros::{ArtifactResolver, MacroRegistry, MacroString};
use crate::enhance::registry::NodeRegistry;
use crate::enhance::resources::EnhancedBundle;
use crate::enhance::toolchain::{CompileRequest, ToolchainInvoker};

/// Nodes produced for one target.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub library: Arc<RuleNode>,
    pub test: Option<Arc<RuleNode>>,
}

impl Assembled {
    /// The node registered under the un-flavored target.
    pub fn main(&self) -> &Arc<RuleNode> {
        self.test.as_ref().unwrap_or(&self.library)
    }
}

/// Effective test-rule timeout: the target's own value, else the process
/// default, else none.
pub fn resolve_timeout(explicit: Option<u64>, default: Option<u64>) -> Option<u64> {
    explicit.or(default)
}

pub struct Assembler<'a> {
    toolchain: &'a dyn ToolchainInvoker,
    registry: &'a NodeRegistry,
}

impl<'a> Assembler<'a> {
    pub fn new(toolchain: &'a dyn ToolchainInvoker, registry: &'a NodeRegistry) -> Self {
        Assembler {
            toolchain,
            registry,
        }
    }

    /// Build and register the library node and, for tests, the test node.
    pub fn assemble(
        &self,
        args: &RuleArgs,
        bundle: &EnhancedBundle,
        compiler: &dyn LibraryCompiler,
        options: &CompilerOptions,
        default_timeout_ms: Option<u64>,
    ) -> Result<Assembled, EnhanceError> {
        let base = args.target();
        let library_target = if args.is_test() {
            base.with_flavor(Flavor::CompiledTests)
        } else {
            base
        };
        let library_params = bundle.params.with_target(library_target);
        let library_args = args.library();

        let library = self.registry.get_or_try_insert_with(library_target, || {
            let invocation = compiler.invocation(options);
            let request = CompileRequest {
                target: library_target,
                srcs: &library_args.srcs,
                classpath: library_params.all_deps(),
                invocation: &invocation,
            };
            let output = self
                .toolchain
                .compile(&request)
                .map_err(|source| EnhanceError::Toolchain {
                    target: library_target,
                    source,
                })?;

            Ok(RuleNode {
                target: library_target,
                declared_deps: library_params.declared_deps().clone(),
                extra_deps: library_params.extra_deps().clone(),
                output: Some(output),
                payload: RulePayload::Library(LibraryPayload {
                    srcs: library_args.srcs.clone(),
                    resources: library_args.resources.clone(),
                    provided_deps: library_args.provided_deps.clone(),
                    track_class_usage: compiler.track_class_usage(options),
                    generated_source_folder: options.generated_source_folder.clone(),
                    compiler: invocation,
                }),
            })
        })?;

        let Some(test_args) = args.test() else {
            return Ok(Assembled {
                library,
                test: None,
            });
        };

        let test = self.registry.get_or_try_insert_with(base, || {
            let env = test_args
                .env
                .iter()
                .map(|(key, raw)| -> Result<_, EnhanceError> {
                    Ok((key.clone(), MacroString::parse(&base, raw)?))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?;

            Ok(RuleNode {
                target: base,
                declared_deps: DepSet::single(library.target),
                extra_deps: library.declared_deps.union(&library.extra_deps),
                output: None,
                payload: RulePayload::Test(TestPayload {
                    library: library.target,
                    labels: test_args.labels.clone(),
                    contacts: test_args.contacts.clone(),
                    vm_args: test_args.vm_args.clone(),
                    env,
                    native_env: bundle.native_env.clone(),
                    dummy_r_dot_java: bundle.resource_node.as_ref().map(|node| node.target),
                    test_rule_timeout_ms: resolve_timeout(args.timeout_ms(), default_timeout_ms),
                    test_case_timeout_ms: test_args.test_case_timeout_ms,
                    run_test_separately: test_args.run_test_separately,
                    fork_mode: test_args.fork_mode,
                    std_out_log_level: test_args.std_out_log_level,
                    std_err_log_level: test_args.std_err_log_level,
                    robolectric_runtime_dependency: test_args
                        .robolectric_runtime_dependency
                        .clone(),
                    robolectric_manifest: test_args.robolectric_manifest.clone(),
                }),
            })
        })?;

        Ok(Assembled {
            library,
            test: Some(test),
        })
    }
}

/// Compute the runtime environment of a test node.
///
/// Capability contributions go in first; a user-supplied variable of the
/// same name replaces them. Non-test nodes have no environment.
pub fn materialize_env(
    node: &RuleNode,
    macros: &MacroRegistry,
    artifacts: &dyn ArtifactResolver,
) -> Result<BTreeMap<String, String>, EnhanceError> {
    let Some(payload) = node.test_payload() else {
        return Ok(BTreeMap::new());
    };

    let mut env = payload.native_env.clone();
    for (key, value) in &payload.env {
        if env.contains_key(key) {
            tracing::debug!("{}: user value for {} replaces injected one", node.target, key);
        }
        env.insert(
            key.clone(),
            macros.substitute_parsed(&node.target, value, artifacts)?,
        );
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::core::args::{LibraryArgs, TestArgs};
    use crate::core::params::RuleParams;
    use crate::core::rule::RuleKind;
    use crate::core::target::BuildTarget;
    use crate::enhance::compiler::JavaLibraryCompiler;
    use crate::enhance::toolchain::PlannedToolchain;
    use crate::test_support::FailingToolchain;

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    fn test_args() -> RuleArgs {
        let library = LibraryArgs::new(t("//app:test"))
            .with_srcs(["FooTest.java"])
            .with_deps([t("//app:lib")]);
        RuleArgs::RobolectricTest(
            TestArgs::new(library).with_env("DATA", "$(location //data:blob)"),
        )
    }

    fn bundle() -> EnhancedBundle {
        EnhancedBundle::unchanged(RuleParams::new(
            t("//app:test"),
            DepSet::single(t("//app:lib")),
            DepSet::single(t("//data:blob")),
        ))
    }

    #[test]
    fn test_library_target_assembles_single_node() {
        let registry = NodeRegistry::new();
        let assembler = Assembler::new(&PlannedToolchain, &registry);
        let args = RuleArgs::AndroidLibrary(LibraryArgs::new(t("//app:lib")));
        let bundle = EnhancedBundle::unchanged(RuleParams::new(
            t("//app:lib"),
            DepSet::new(),
            DepSet::new(),
        ));

        let assembled = assembler
            .assemble(&args, &bundle, &JavaLibraryCompiler::default(), &CompilerOptions::default(), None)
            .unwrap();

        assert!(assembled.test.is_none());
        assert_eq!(assembled.main().target, t("//app:lib"));
        assert_eq!(assembled.library.kind(), RuleKind::Library);
        assert!(assembled.library.output.is_some());
    }

    #[test]
    fn test_test_node_wraps_compiled_tests_library() {
        let registry = NodeRegistry::new();
        let assembler = Assembler::new(&PlannedToolchain, &registry);

        let assembled = assembler
            .assemble(&test_args(), &bundle(), &JavaLibraryCompiler::default(), &CompilerOptions::default(), Some(60_000))
            .unwrap();

        let library = &assembled.library;
        let test = assembled.test.as_ref().unwrap();
        assert_eq!(library.target, t("//app:test#compiled-tests"));
        assert_eq!(test.target, t("//app:test"));
        assert_eq!(test.declared_deps.to_vec(), vec![library.target]);
        assert_eq!(test.extra_deps.to_vec(), vec![t("//app:lib"), t("//data:blob")]);
        assert_eq!(test.test_payload().unwrap().test_rule_timeout_ms, Some(60_000));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_toolchain_failure_passes_through() {
        let registry = NodeRegistry::new();
        let toolchain = FailingToolchain::new("javac exited with status 1");
        let assembler = Assembler::new(&toolchain, &registry);

        let err = assembler
            .assemble(&test_args(), &bundle(), &JavaLibraryCompiler::default(), &CompilerOptions::default(), None)
            .unwrap_err();

        match &err {
            EnhanceError::Toolchain { target, source } => {
                assert_eq!(*target, t("//app:test#compiled-tests"));
                assert!(source.to_string().contains("status 1"));
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_timeout_resolution() {
        assert_eq!(resolve_timeout(Some(5), Some(10)), Some(5));
        assert_eq!(resolve_timeout(None, Some(10)), Some(10));
        assert_eq!(resolve_timeout(None, None), None);
    }

    #[test]
    fn test_own_timeout_beats_process_default() {
        let registry = NodeRegistry::new();
        let assembler = Assembler::new(&PlannedToolchain, &registry);
        let RuleArgs::RobolectricTest(args) = test_args() else {
            unreachable!()
        };
        let args = RuleArgs::RobolectricTest(args.with_timeout_ms(1_500));

        let assembled = assembler
            .assemble(&args, &bundle(), &JavaLibraryCompiler::default(), &CompilerOptions::default(), Some(60_000))
            .unwrap();

        let payload = assembled.main().test_payload().unwrap();
        assert_eq!(payload.test_rule_timeout_ms, Some(1_500));
    }

    #[test]
    fn test_user_env_wins_over_injected() {
        let registry = NodeRegistry::new();
        let assembler = Assembler::new(&PlannedToolchain, &registry);
        let RuleArgs::RobolectricTest(args) = test_args() else {
            unreachable!()
        };
        let args = RuleArgs::RobolectricTest(args.with_env("LD_LIBRARY_PATH", "/mine"));

        let mut bundle = bundle();
        bundle
            .native_env
            .insert("LD_LIBRARY_PATH".to_string(), "/injected".to_string());

        let assembled = assembler
            .assemble(&args, &bundle, &JavaLibraryCompiler::default(), &CompilerOptions::default(), None)
            .unwrap();

        let artifacts = BTreeMap::from([(t("//data:blob"), PathBuf::from("/out/blob.jar"))]);
        let env = materialize_env(assembled.main(), &MacroRegistry::new(), &artifacts).unwrap();

        assert_eq!(env["LD_LIBRARY_PATH"], "/mine");
        assert_eq!(env["DATA"], "/out/blob.jar");
    }
}
