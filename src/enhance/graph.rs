//! Enhanced graphs and their ordering.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::core::rule::RuleNode;
use crate::core::target::BuildTarget;
use crate::enhance::errors::EnhanceError;
use crate::enhance::registry::NodeRegistry;
use crate::util::hash::Fingerprint;

/// Dependency graph over rule nodes.
///
/// An edge `a -> b` means `a` depends on `b`. Edges to targets outside the
/// node set are dropped.
#[derive(Debug, Clone)]
pub struct RuleGraph {
    graph: DiGraph<BuildTarget, ()>,
    index: HashMap<BuildTarget, NodeIndex>,
}

impl RuleGraph {
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a RuleNode>) -> Self {
        let mut nodes: Vec<&RuleNode> = nodes.into_iter().collect();
        nodes.sort_by_key(|node| node.target);
        nodes.dedup_by_key(|node| node.target);

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for node in &nodes {
            index.insert(node.target, graph.add_node(node.target));
        }

        for node in &nodes {
            let from = index[&node.target];
            for dep in node.deps() {
                if let Some(&to) = index.get(&dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        RuleGraph { graph, index }
    }

    /// Graph over every node constructed in `registry`.
    pub fn from_registry(registry: &NodeRegistry) -> Self {
        let nodes = registry.nodes();
        Self::from_nodes(nodes.values().map(|node| node.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of `target` within the graph.
    pub fn deps(&self, target: &BuildTarget) -> Vec<BuildTarget> {
        self.neighbors(target, petgraph::Direction::Outgoing)
    }

    /// Nodes that depend on `target`.
    pub fn dependents(&self, target: &BuildTarget) -> Vec<BuildTarget> {
        self.neighbors(target, petgraph::Direction::Incoming)
    }

    fn neighbors(&self, target: &BuildTarget, direction: petgraph::Direction) -> Vec<BuildTarget> {
        let Some(&node) = self.index.get(target) else {
            return Vec::new();
        };
        let mut found: Vec<BuildTarget> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n])
            .collect();
        found.sort();
        found
    }

    /// Nodes with dependencies before dependents.
    pub fn topological_order(&self) -> Result<Vec<BuildTarget>, EnhanceError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().rev().map(|n| self.graph[n]).collect()),
            Err(cycle) => {
                let mut targets: Vec<BuildTarget> = tarjan_scc(&self.graph)
                    .into_iter()
                    .find(|component| component.contains(&cycle.node_id()))
                    .unwrap_or_else(|| vec![cycle.node_id()])
                    .into_iter()
                    .map(|n| self.graph[n])
                    .collect();
                targets.sort();
                Err(EnhanceError::Cycle { targets })
            }
        }
    }
}

/// The nodes reachable from one requested target.
#[derive(Debug, Clone)]
pub struct EnhancedGraph {
    root: BuildTarget,
    nodes: BTreeMap<BuildTarget, Arc<RuleNode>>,
}

impl EnhancedGraph {
    pub fn new(root: BuildTarget, nodes: BTreeMap<BuildTarget, Arc<RuleNode>>) -> Self {
        EnhancedGraph { root, nodes }
    }

    /// Snapshot the part of `registry` reachable from `root`.
    pub fn from_registry(registry: &NodeRegistry, root: BuildTarget) -> Self {
        EnhancedGraph::new(root, registry.closure(&root))
    }

    pub fn root(&self) -> BuildTarget {
        self.root
    }

    pub fn root_node(&self) -> Option<&Arc<RuleNode>> {
        self.nodes.get(&self.root)
    }

    pub fn node(&self, target: &BuildTarget) -> Option<&Arc<RuleNode>> {
        self.nodes.get(target)
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.nodes.contains_key(target)
    }

    /// Nodes ordered by target.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<RuleNode>> + '_ {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn rule_graph(&self) -> RuleGraph {
        RuleGraph::from_nodes(self.nodes.values().map(|node| node.as_ref()))
    }

    /// Nodes with dependencies before dependents.
    pub fn topological_order(&self) -> Result<Vec<BuildTarget>, EnhanceError> {
        self.rule_graph().topological_order()
    }

    /// Fingerprint over every node of the graph.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let mut fp = Fingerprint::new();
        fp.update_str(&self.root.to_string());
        for node in self.nodes.values() {
            fp.update_str(&node.fingerprint()?);
        }
        Ok(fp.finish())
    }
}

impl Serialize for EnhancedGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<&RuleNode> = self.nodes.values().map(|node| node.as_ref()).collect();
        let mut state = serializer.serialize_struct("EnhancedGraph", 2)?;
        state.serialize_field("root", &self.root)?;
        state.serialize_field("nodes", &nodes)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dep_set::DepSet;
    use crate::core::rule::{AbiPayload, RulePayload};

    fn t(s: &str) -> BuildTarget {
        BuildTarget::parse(s).unwrap()
    }

    fn node(target: &str, deps: &[&str]) -> RuleNode {
        let target = t(target);
        RuleNode {
            target,
            declared_deps: deps.iter().map(|d| t(d)).collect(),
            extra_deps: DepSet::new(),
            output: None,
            payload: RulePayload::ClassAbi(AbiPayload {
                library: target,
                library_output: None,
            }),
        }
    }

    #[test]
    fn test_topological_order_puts_deps_first() {
        let nodes = [
            node("//app:test", &["//app:test#compiled-tests"]),
            node("//app:test#compiled-tests", &["//app:test#dummy_r_dot_java", "//ext:lib"]),
            node("//app:test#dummy_r_dot_java", &[]),
        ];
        let graph = RuleGraph::from_nodes(nodes.iter());
        let order = graph.topological_order().unwrap();

        let position = |s: &str| order.iter().position(|x| *x == t(s)).unwrap();
        assert_eq!(order.len(), 3);
        assert!(position("//app:test#dummy_r_dot_java") < position("//app:test#compiled-tests"));
        assert!(position("//app:test#compiled-tests") < position("//app:test"));
        assert_eq!(graph.dependents(&t("//app:test#compiled-tests")), vec![t("//app:test")]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let nodes = [
            node("//a:a", &["//b:b"]),
            node("//b:b", &["//a:a"]),
            node("//c:c", &["//a:a"]),
        ];
        let err = RuleGraph::from_nodes(nodes.iter())
            .topological_order()
            .unwrap_err();

        match err {
            EnhanceError::Cycle { targets } => assert_eq!(targets, vec![t("//a:a"), t("//b:b")]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_graph_serializes_nodes_in_order() {
        let nodes: BTreeMap<_, _> = [node("//b:b", &[]), node("//a:a", &["//b:b"])]
            .into_iter()
            .map(|n| (n.target, Arc::new(n)))
            .collect();
        let graph = EnhancedGraph::new(t("//a:a"), nodes);

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["root"], "//a:a");
        assert_eq!(json["nodes"][0]["target"], "//a:a");
        assert_eq!(json["nodes"][1]["target"], "//b:b");
        assert_eq!(graph.root_node().unwrap().target, t("//a:a"));
    }
}
