//! Native-library bridge injection.
//!
//! A test that opts into `use_cxx_libraries` gets every eligible native
//! library in its dependency closure linked into one directory, and that
//! directory put on the platform's library search path.

use serde::{Deserialize, Serialize};

use crate::core::args::NativeCapabilities;
use crate::core::dep_set::DepSet;
use crate::core::flavor::Flavor;
use crate::core::rule::{NativeLibsPayload, RuleNode, RulePayload};
use crate::core::target::BuildTarget;
use crate::core::universe::{self, DependencyMode, TargetUniverse};
use crate::enhance::errors::{Component, EnhanceError};
use crate::enhance::registry::NodeRegistry;
use crate::enhance::resources::EnhancedBundle;
use crate::enhance::toolchain::OutputPathProvider;

/// The platform native libraries are loaded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativePlatform {
    /// Platform flavor name, e.g. `linux-x86_64`
    pub name: String,

    /// Environment variable the dynamic loader searches
    pub search_path_env: String,
}

impl Default for NativePlatform {
    fn default() -> Self {
        NativePlatform::host()
    }
}

impl NativePlatform {
    /// The platform this process runs on.
    pub fn host() -> Self {
        let search_path_env = if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else if cfg!(windows) {
            "PATH"
        } else {
            "LD_LIBRARY_PATH"
        };
        NativePlatform {
            name: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            search_path_env: search_path_env.to_string(),
        }
    }
}

pub struct NativeBridgeInjector<'a> {
    universe: &'a dyn TargetUniverse,
    registry: &'a NodeRegistry,
    paths: &'a dyn OutputPathProvider,
    platform: &'a NativePlatform,
}

impl<'a> NativeBridgeInjector<'a> {
    pub fn new(
        universe: &'a dyn TargetUniverse,
        registry: &'a NodeRegistry,
        paths: &'a dyn OutputPathProvider,
        platform: &'a NativePlatform,
    ) -> Self {
        NativeBridgeInjector {
            universe,
            registry,
            paths,
            platform,
        }
    }

    /// Add the native bridge to `bundle` if `capabilities` ask for it and
    /// there is at least one eligible native library to bridge.
    ///
    /// Either both the bridge dep and its environment are added, or the
    /// bundle comes back unchanged.
    pub fn maybe_inject(
        &self,
        target: BuildTarget,
        bundle: EnhancedBundle,
        capabilities: &NativeCapabilities,
    ) -> Result<EnhancedBundle, EnhanceError> {
        if !capabilities.requested {
            return Ok(bundle);
        }

        let reachable = universe::scan(
            self.universe,
            bundle.universe_deps(),
            DependencyMode::Transitive,
            target,
            Component::NativeInjector,
        )?;

        let libraries: DepSet = reachable
            .values()
            .filter(|entry| entry.kind.is_native() && capabilities.allows(&entry.target))
            .map(|entry| entry.target)
            .collect();

        if libraries.is_empty() {
            tracing::debug!("{} asked for native libraries but none are eligible", target);
            return Ok(bundle);
        }

        let key = target.with_flavor(Flavor::NativeLibs);
        let link_root = self.paths.gen_dir(&key);
        let node = self.registry.get_or_try_insert_with(key, || {
            tracing::debug!("bridging {} native libraries into {}", libraries.len(), key);
            Ok(RuleNode {
                target: key,
                declared_deps: libraries.clone(),
                extra_deps: DepSet::new(),
                output: None,
                payload: RulePayload::NativeLibs(NativeLibsPayload {
                    libraries: libraries.clone(),
                    link_root: link_root.clone(),
                    search_path_env: self.platform.search_path_env.clone(),
                }),
            })
        })?;

        let mut native_env = bundle.native_env;
        native_env.insert(
            self.platform.search_path_env.clone(),
            link_root.display().to_string(),
        );

        Ok(EnhancedBundle {
            params: bundle.params.appending_declared_deps(&DepSet::single(key)),
            resource_node: bundle.resource_node,
            native_node: Some(node),
            native_env,
        })
    }
}
