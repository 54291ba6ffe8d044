//! Flavor dispatch - choosing a construction path from a target's flavors.
//!
//! A `class-abi` request short-circuits to a minimal node wrapping the main
//! node's output. Everything else goes down the main enhancement path.

use std::sync::Arc;

use crate::core::args::RuleArgs;
use crate::core::dep_set::DepSet;
use crate::core::flavor::Flavor;
use crate::core::rule::{AbiPayload, RuleNode, RulePayload};
use crate::core::target::BuildTarget;
use crate::enhance::errors::EnhanceError;
use crate::enhance::registry::NodeRegistry;
use crate::enhance::toolchain::OutputPathProvider;

/// A target that needs the full enhancement pipeline.
#[derive(Debug, Clone, Copy)]
pub struct EnhancementRequest<'a> {
    /// The requested identifier, possibly flavored
    pub target: BuildTarget,
    /// Arguments of the un-flavored target
    pub args: &'a RuleArgs,
}

/// Outcome of dispatching a request.
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// The ABI node, already built
    Abi(Arc<RuleNode>),
    /// Continue down the main path
    Enhance(EnhancementRequest<'a>),
}

/// Find the first flavor that cannot ride along with `class-abi`.
pub fn abi_conflict(target: &BuildTarget) -> Option<Flavor> {
    if !target.has_flavor(Flavor::ClassAbi) {
        return None;
    }
    target.flavors().iter().find(Flavor::conflicts_with_abi)
}

pub struct FlavorDispatcher<'a> {
    registry: &'a NodeRegistry,
    paths: &'a dyn OutputPathProvider,
}

impl<'a> FlavorDispatcher<'a> {
    pub fn new(registry: &'a NodeRegistry, paths: &'a dyn OutputPathProvider) -> Self {
        FlavorDispatcher { registry, paths }
    }

    /// Dispatch `target`, whose un-flavored form is described by `args`.
    ///
    /// `require` must return the main node of an un-flavored target,
    /// building it if needed. It is only called on the ABI path.
    pub fn dispatch<'r, F>(
        &self,
        target: BuildTarget,
        args: &'r RuleArgs,
        require: F,
    ) -> Result<Dispatch<'r>, EnhanceError>
    where
        F: FnOnce(BuildTarget) -> Result<Arc<RuleNode>, EnhanceError>,
    {
        if !target.has_flavor(Flavor::ClassAbi) {
            return Ok(Dispatch::Enhance(EnhancementRequest { target, args }));
        }

        if let Some(conflicting) = abi_conflict(&target) {
            return Err(EnhanceError::FlavorConflict {
                target,
                flavor: Flavor::ClassAbi,
                conflicting,
            });
        }

        let node = self.registry.get_or_try_insert_with(target, || {
            let base = target.unflavored();
            let main = require(base)?;
            tracing::debug!("deriving ABI node {} from {}", target, base);

            Ok(RuleNode {
                target,
                declared_deps: DepSet::single(base),
                extra_deps: DepSet::new(),
                output: None,
                payload: RulePayload::ClassAbi(AbiPayload {
                    library: base,
                    library_output: self.library_output(&main),
                }),
            })
        })?;

        Ok(Dispatch::Abi(node))
    }

    /// Output path of the library behind a main node. For a test the
    /// library is its compiled-tests node.
    fn library_output(&self, main: &RuleNode) -> Option<std::path::PathBuf> {
        if let Some(output) = &main.output {
            return Some(self.paths.output_path(output));
        }
        let library = self.registry.get(&main.test_payload()?.library)?;
        library
            .output
            .as_ref()
            .map(|output| self.paths.output_path(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::args::LibraryArgs;
    use crate::enhance::toolchain::{BuckOutPaths, CompiledArtifactRef};

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    fn library_node(target: BuildTarget) -> RuleNode {
        RuleNode {
            target,
            declared_deps: DepSet::single(t("//dep:a")),
            extra_deps: DepSet::single(t("//dep:b")),
            output: Some(CompiledArtifactRef::jar_for(target)),
            payload: RulePayload::ClassAbi(AbiPayload {
                library: target,
                library_output: None,
            }),
        }
    }

    #[test]
    fn test_plain_target_goes_down_main_path() {
        let registry = NodeRegistry::new();
        let paths = BuckOutPaths::new("/out");
        let args = RuleArgs::AndroidLibrary(LibraryArgs::new(t("//app:lib")));

        let dispatch = FlavorDispatcher::new(&registry, &paths)
            .dispatch(t("//app:lib"), &args, |_| panic!("main node must not be required"))
            .unwrap();

        assert!(matches!(dispatch, Dispatch::Enhance(request) if request.target == t("//app:lib")));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_abi_node_depends_only_on_base() {
        let registry = NodeRegistry::new();
        let paths = BuckOutPaths::new("/out");
        let args = RuleArgs::AndroidLibrary(LibraryArgs::new(t("//app:lib")));
        let abi = t("//app:lib#class-abi");

        let dispatch = FlavorDispatcher::new(&registry, &paths)
            .dispatch(abi, &args, |base| {
                registry.get_or_try_insert_with(base, || Ok(library_node(base)))
            })
            .unwrap();

        let Dispatch::Abi(node) = dispatch else {
            panic!("expected ABI node");
        };
        assert_eq!(node.target, abi);
        assert_eq!(node.deps(), vec![t("//app:lib")]);
        assert!(node.output.is_none());
        match &node.payload {
            RulePayload::ClassAbi(payload) => assert_eq!(
                payload.library_output.as_deref(),
                Some(std::path::Path::new("/out/gen/app/lib__lib__output/lib.jar"))
            ),
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(registry.contains(&t("//app:lib")));
    }

    #[test]
    fn test_conflicting_flavors_rejected() {
        let registry = NodeRegistry::new();
        let paths = BuckOutPaths::new("/out");
        let args = RuleArgs::AndroidLibrary(LibraryArgs::new(t("//app:lib")));

        for (raw, conflicting) in [
            ("//app:lib#class-abi,compiled-tests", Flavor::CompiledTests),
            ("//app:lib#class-abi,dummy_r_dot_java", Flavor::DummyRDotJava),
        ] {
            let err = FlavorDispatcher::new(&registry, &paths)
                .dispatch(t(raw), &args, |_| panic!("must fail before building"))
                .unwrap_err();
            match err {
                EnhanceError::FlavorConflict {
                    flavor,
                    conflicting: found,
                    ..
                } => {
                    assert_eq!(flavor, Flavor::ClassAbi);
                    assert_eq!(found, conflicting);
                }
                other => panic!("unexpected error {other}"),
            }
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_native_libs_flavor_is_not_a_conflict() {
        assert_eq!(abi_conflict(&t("//a:b#class-abi,native-libs")), None);
        assert_eq!(abi_conflict(&t("//a:b#compiled-tests")), None);
    }
}
