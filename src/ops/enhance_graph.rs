//! Enhancement sessions over a target file.
//!
//! A session loads the target file and the merged configuration once, then
//! answers `graph`, `deps` and `env` queries from a single `Enhancer` so
//! every query shares the same node registry.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;

use crate::core::args::RuleArgs;
use crate::core::rule::RuleNode;
use crate::core::target::BuildTarget;
use crate::enhance::graph::EnhancedGraph;
use crate::enhance::pipeline::Enhancer;
use crate::enhance::toolchain::BuckOutPaths;
use crate::ops::target_file::{find_target_file, TargetSet};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::suggestions;

/// Options for opening a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Directory relative paths and the project config are resolved from
    pub project_root: PathBuf,

    /// Target file (defaults to `targets.toml` in the project root)
    pub target_file: Option<PathBuf>,

    /// Output root overriding the configured one
    pub output_root: Option<PathBuf>,

    /// Configuration to use instead of loading global and project files
    pub config: Option<Config>,
}

/// Output format for rendered graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GraphFormat {
    #[default]
    Text,
    Json,
}

/// A loaded target file plus the enhancer that expands it.
pub struct Session {
    targets: TargetSet,
    enhancer: Enhancer,
    output_root: PathBuf,
}

impl Session {
    /// Load the target file and configuration and build an enhancer.
    pub fn open(options: &SessionOptions) -> Result<Self> {
        let path = find_target_file(options.target_file.as_deref(), &options.project_root)?;
        let targets = TargetSet::load(&path)?;

        let config = match &options.config {
            Some(config) => config.clone(),
            None => load_config(
                global_config_path().as_deref(),
                &project_config_path(&options.project_root),
            ),
        };

        let output_root = match &options.output_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => options.project_root.join(root),
            None => config.output_root(&options.project_root),
        };

        tracing::debug!(
            "loaded {} rules from {}, output root {}",
            targets.len(),
            path.display(),
            output_root.display()
        );

        let enhancer = Enhancer::builder(Arc::new(targets.universe().clone()))
            .paths(Arc::new(BuckOutPaths::new(output_root.clone())))
            .defaults(config.defaults())
            .build();

        Ok(Session {
            targets,
            enhancer,
            output_root,
        })
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn enhancer(&self) -> &Enhancer {
        &self.enhancer
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Parse a requested label and find the rule behind it.
    ///
    /// Flavored labels are accepted; the rule is looked up by the
    /// un-flavored form.
    pub fn request(&self, label: &str) -> Result<(BuildTarget, RuleArgs)> {
        let target = BuildTarget::parse(label).map_err(|e| anyhow!("{}", e))?;
        let Some(args) = self.targets.rule(&target) else {
            bail!(
                "unknown target `{}`\n{}",
                target,
                suggestions::TARGET_NOT_FOUND
            );
        };
        Ok((target, args.clone()))
    }

    /// Every enhanceable rule, un-flavored.
    pub fn all_requests(&self) -> Vec<(BuildTarget, RuleArgs)> {
        self.targets
            .rules()
            .map(|(target, args)| (*target, args.clone()))
            .collect()
    }

    /// Enhance the given labels, or every rule when `labels` is empty.
    pub fn enhance(&self, labels: &[String]) -> Result<Vec<EnhancedGraph>> {
        let requests = if labels.is_empty() {
            self.all_requests()
        } else {
            labels
                .iter()
                .map(|label| self.request(label))
                .collect::<Result<Vec<_>>>()?
        };

        if requests.is_empty() {
            tracing::warn!("target file declares no enhanceable rules");
        }

        Ok(self.enhancer.enhance_all(&requests)?)
    }

    /// Dependencies of one enhanced node.
    pub fn deps(&self, label: &str) -> Result<DepsReport> {
        let (target, args) = self.request(label)?;
        let node = self.enhancer.enhance_node(target, &args)?;
        let macro_deps = self.enhancer.extract_macro_deps(&args)?;

        Ok(DepsReport {
            target,
            kind: node.kind().as_str(),
            declared: node.declared_deps.to_vec(),
            extra: node.extra_deps.to_vec(),
            macros: macro_deps.to_vec(),
        })
    }

    /// Runtime environment of a test target.
    ///
    /// Every rule is enhanced first so `location` macros can point at any
    /// rule in the file.
    pub fn env(&self, label: &str) -> Result<BTreeMap<String, String>> {
        let (target, args) = self.request(label)?;
        if !args.is_test() {
            bail!(
                "`{}` is a {}, only tests have a runtime environment",
                target,
                args.kind_name()
            );
        }

        self.enhancer.enhance_all(&self.all_requests())?;
        let node = self.enhancer.enhance_node(target.unflavored(), &args)?;
        Ok(self.enhancer.materialize_env(&node)?)
    }
}

/// Result of `deps`.
#[derive(Debug, Clone, Serialize)]
pub struct DepsReport {
    pub target: BuildTarget,
    pub kind: &'static str,
    pub declared: Vec<BuildTarget>,
    pub extra: Vec<BuildTarget>,
    /// Targets referenced from macros in string arguments
    pub macros: Vec<BuildTarget>,
}

impl DepsReport {
    pub fn render(&self) -> String {
        let mut out = format!("{} ({})\n", self.target, self.kind);
        for (heading, deps) in [
            ("declared", &self.declared),
            ("extra", &self.extra),
            ("macros", &self.macros),
        ] {
            if deps.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{}:", heading);
            for dep in deps {
                let _ = writeln!(out, "  {}", dep);
            }
        }
        out
    }
}

/// Render graphs in the given format.
pub fn render(graphs: &[EnhancedGraph], format: GraphFormat) -> Result<String> {
    match format {
        GraphFormat::Text => render_text(graphs),
        GraphFormat::Json => render_json(graphs),
    }
}

/// Render graphs as JSON.
pub fn render_json(graphs: &[EnhancedGraph]) -> Result<String> {
    Ok(serde_json::to_string_pretty(graphs)?)
}

/// Render graphs as an indented listing, dependencies first.
pub fn render_text(graphs: &[EnhancedGraph]) -> Result<String> {
    let mut out = String::new();
    for graph in graphs {
        let _ = writeln!(out, "{} ({} nodes)", graph.root(), graph.len());
        for target in graph.topological_order()? {
            if let Some(node) = graph.node(&target) {
                render_node(&mut out, node);
            }
        }
    }
    Ok(out)
}

fn render_node(out: &mut String, node: &RuleNode) {
    let _ = writeln!(out, "  {} [{}]", node.target, node.kind());
    for dep in node.declared_deps.iter() {
        let _ = writeln!(out, "    -> {}", dep);
    }
    for dep in node.extra_deps.difference(&node.declared_deps).iter() {
        let _ = writeln!(out, "    ~> {}", dep);
    }
    if let Some(output) = &node.output {
        let _ = writeln!(out, "    out: {}", output.relative_path().display());
    }
}

/// Render an environment as `KEY=value` lines.
pub fn render_env(env: &BTreeMap<String, String>) -> String {
    env.iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect()
}
