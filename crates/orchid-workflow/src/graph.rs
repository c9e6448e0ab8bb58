//! The directed workflow graph and its construction-time validation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::GraphError;
use crate::node::Node;
use crate::state::RunState;

/// A pure routing function: given the state a node exits with, pick the
/// name of the next node from the edge's declared targets.
pub type EdgeSelector = Arc<dyn Fn(&RunState) -> String + Send + Sync>;

/// The outgoing edge of a node.
#[derive(Clone)]
pub enum Edge {
  /// Always advance to the named node.
  Unconditional(String),
  /// Evaluate the selector exactly once per node exit; the result must be
  /// one of the declared targets.
  Conditional {
    selector: EdgeSelector,
    targets: Vec<String>,
  },
}

impl Edge {
  /// All nodes this edge can reach.
  pub fn targets(&self) -> Vec<&str> {
    match self {
      Edge::Unconditional(to) => vec![to.as_str()],
      Edge::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
    }
  }
}

impl std::fmt::Debug for Edge {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Edge::Unconditional(to) => f.debug_tuple("Unconditional").field(to).finish(),
      Edge::Conditional { targets, .. } => {
        f.debug_struct("Conditional").field("targets", targets).finish()
      }
    }
  }
}

/// A validated workflow graph: named nodes, one outgoing edge per
/// non-terminal node, one entry, one or more terminals.
pub struct WorkflowGraph {
  nodes: HashMap<String, Arc<dyn Node>>,
  edges: HashMap<String, Edge>,
  entry: String,
  terminals: HashSet<String>,
}

impl WorkflowGraph {
  pub fn builder() -> GraphBuilder {
    GraphBuilder::default()
  }

  pub fn entry(&self) -> &str {
    &self.entry
  }

  pub fn node(&self, name: &str) -> Option<&Arc<dyn Node>> {
    self.nodes.get(name)
  }

  pub fn edge(&self, name: &str) -> Option<&Edge> {
    self.edges.get(name)
  }

  /// Terminal nodes have no outgoing edge.
  pub fn is_terminal(&self, name: &str) -> bool {
    self.terminals.contains(name)
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }
}

impl std::fmt::Debug for WorkflowGraph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WorkflowGraph")
      .field("entry", &self.entry)
      .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
      .field("edges", &self.edges)
      .field("terminals", &self.terminals)
      .finish()
  }
}

/// Builder for [`WorkflowGraph`]; `build` performs all validation.
#[derive(Default)]
pub struct GraphBuilder {
  nodes: Vec<(String, Arc<dyn Node>)>,
  edges: Vec<(String, Edge)>,
  entry: Option<String>,
}

impl GraphBuilder {
  pub fn add_node(mut self, name: impl Into<String>, node: impl Node + 'static) -> Self {
    self.nodes.push((name.into(), Arc::new(node)));
    self
  }

  pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
    self
      .edges
      .push((from.into(), Edge::Unconditional(to.into())));
    self
  }

  pub fn add_conditional_edges<F>(
    mut self,
    from: impl Into<String>,
    selector: F,
    targets: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self
  where
    F: Fn(&RunState) -> String + Send + Sync + 'static,
  {
    self.edges.push((
      from.into(),
      Edge::Conditional {
        selector: Arc::new(selector),
        targets: targets.into_iter().map(Into::into).collect(),
      },
    ));
    self
  }

  pub fn entry(mut self, name: impl Into<String>) -> Self {
    self.entry = Some(name.into());
    self
  }

  /// Validate and freeze the graph.
  ///
  /// Checks: unique node names, declared entry that exists, every edge
  /// source and target exists, at most one edge per node, conditional
  /// edges declare at least one target, at least one terminal node,
  /// every node reachable from the entry, and no cycle consisting solely
  /// of unconditional edges (such a cycle has no exit).
  pub fn build(self) -> Result<WorkflowGraph, GraphError> {
    let mut nodes: HashMap<String, Arc<dyn Node>> = HashMap::new();
    for (name, node) in self.nodes {
      if nodes.insert(name.clone(), node).is_some() {
        return Err(GraphError::DuplicateNode(name));
      }
    }

    let entry = self.entry.ok_or(GraphError::MissingEntry)?;
    if !nodes.contains_key(&entry) {
      return Err(GraphError::EntryNotFound(entry));
    }

    let mut edges: HashMap<String, Edge> = HashMap::new();
    for (from, edge) in self.edges {
      if !nodes.contains_key(&from) {
        return Err(GraphError::UnknownSource(from));
      }
      if let Edge::Conditional { targets, .. } = &edge {
        if targets.is_empty() {
          return Err(GraphError::EmptyTargets(from));
        }
      }
      for to in edge.targets() {
        if !nodes.contains_key(to) {
          return Err(GraphError::InvalidEdge {
            from: from.clone(),
            to: to.to_string(),
          });
        }
      }
      if edges.insert(from.clone(), edge).is_some() {
        return Err(GraphError::DuplicateEdge(from));
      }
    }

    let terminals: HashSet<String> = nodes
      .keys()
      .filter(|name| !edges.contains_key(*name))
      .cloned()
      .collect();
    if terminals.is_empty() {
      return Err(GraphError::NoTerminal);
    }

    // Reachability from the entry.
    let mut reachable: HashSet<&str> = HashSet::new();
    let mut stack = vec![entry.as_str()];
    while let Some(name) = stack.pop() {
      if !reachable.insert(name) {
        continue;
      }
      if let Some(edge) = edges.get(name) {
        stack.extend(edge.targets());
      }
    }
    if let Some(unreachable) = nodes.keys().find(|name| !reachable.contains(name.as_str())) {
      return Err(GraphError::Unreachable(unreachable.clone()));
    }

    detect_unconditional_cycle(&nodes, &edges)?;

    Ok(WorkflowGraph {
      nodes,
      edges,
      entry,
      terminals,
    })
  }
}

/// Cycle detection over unconditional edges only.
///
/// A cycle that includes a conditional edge can exit through another
/// target, so only pure unconditional cycles are structural errors. Each
/// node has at most one outgoing edge, so the unconditional subgraph is a
/// set of chains: walk each chain, coloring nodes in-progress/done.
fn detect_unconditional_cycle(
  nodes: &HashMap<String, Arc<dyn Node>>,
  edges: &HashMap<String, Edge>,
) -> Result<(), GraphError> {
  // 0 = unvisited, 1 = on the current chain, 2 = done
  let mut color: HashMap<&str, u8> = nodes.keys().map(|name| (name.as_str(), 0u8)).collect();

  for start in nodes.keys() {
    if color.get(start.as_str()).copied() != Some(0) {
      continue;
    }

    let mut chain: Vec<&str> = Vec::new();
    let mut current = start.as_str();
    loop {
      match color.get(current).copied() {
        Some(1) => return Err(GraphError::UnboundedCycle(current.to_string())),
        Some(2) => break,
        _ => {}
      }
      color.insert(current, 1);
      chain.push(current);

      match edges.get(current) {
        Some(Edge::Unconditional(next)) => current = next.as_str(),
        _ => break,
      }
    }
    for name in chain {
      color.insert(name, 2);
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;

  use crate::node::{Node, NodeResult};

  use super::*;

  struct Noop;

  #[async_trait]
  impl Node for Noop {
    async fn execute(&self, state: &RunState, _attempt: u32) -> NodeResult {
      NodeResult::Terminal {
        state: state.clone(),
      }
    }
  }

  fn two_node_builder() -> GraphBuilder {
    WorkflowGraph::builder()
      .add_node("load", Noop)
      .add_node("finish", Noop)
      .add_edge("load", "finish")
      .entry("load")
  }

  #[test]
  fn test_valid_two_node_graph() {
    let graph = two_node_builder().build().expect("valid graph");
    assert_eq!(graph.entry(), "load");
    assert!(graph.is_terminal("finish"));
    assert!(!graph.is_terminal("load"));
  }

  #[test]
  fn test_edge_to_unknown_node_fails() {
    let err = WorkflowGraph::builder()
      .add_node("load", Noop)
      .add_edge("load", "missing")
      .entry("load")
      .build()
      .expect_err("unknown target must fail");
    assert!(matches!(err, GraphError::InvalidEdge { .. }));
  }

  #[test]
  fn test_missing_entry_fails() {
    let err = WorkflowGraph::builder()
      .add_node("load", Noop)
      .build()
      .expect_err("no entry must fail");
    assert!(matches!(err, GraphError::MissingEntry));
  }

  #[test]
  fn test_unreachable_node_fails() {
    let err = WorkflowGraph::builder()
      .add_node("load", Noop)
      .add_node("island", Noop)
      .add_node("finish", Noop)
      .add_edge("load", "finish")
      .entry("load")
      .build()
      .expect_err("unreachable node must fail");
    assert!(matches!(err, GraphError::Unreachable(name) if name == "island"));
  }

  #[test]
  fn test_unconditional_cycle_fails() {
    let err = WorkflowGraph::builder()
      .add_node("a", Noop)
      .add_node("b", Noop)
      .add_node("finish", Noop)
      .add_edge("a", "b")
      .add_edge("b", "a")
      .entry("a")
      .build()
      .expect_err("pure cycle must fail");
    // "finish" is also unreachable here; either structural error is
    // acceptable, but the cycle must not survive validation.
    assert!(matches!(
      err,
      GraphError::UnboundedCycle(_) | GraphError::Unreachable(_)
    ));
  }

  #[test]
  fn test_conditional_cycle_is_allowed() {
    let graph = WorkflowGraph::builder()
      .add_node("run", Noop)
      .add_node("repair", Noop)
      .add_node("finish", Noop)
      .add_conditional_edges("run", |_state| "finish".to_string(), ["repair", "finish"])
      .add_edge("repair", "run")
      .entry("run")
      .build()
      .expect("conditional cycle is bounded by its selector");
    assert!(graph.is_terminal("finish"));
  }

  #[test]
  fn test_conditional_edge_without_targets_fails() {
    let err = WorkflowGraph::builder()
      .add_node("a", Noop)
      .add_node("finish", Noop)
      .add_conditional_edges("a", |_state| "finish".to_string(), Vec::<String>::new())
      .entry("a")
      .build()
      .expect_err("no targets must fail");
    assert!(matches!(err, GraphError::EmptyTargets(_)));
  }

  #[test]
  fn test_all_nodes_with_edges_fails() {
    let err = WorkflowGraph::builder()
      .add_node("a", Noop)
      .add_edge("a", "a")
      .entry("a")
      .build()
      .expect_err("no terminal must fail");
    assert!(matches!(
      err,
      GraphError::NoTerminal | GraphError::UnboundedCycle(_)
    ));
  }

  #[test]
  fn test_duplicate_node_fails() {
    let err = WorkflowGraph::builder()
      .add_node("a", Noop)
      .add_node("a", Noop)
      .entry("a")
      .build()
      .expect_err("duplicate name must fail");
    assert!(matches!(err, GraphError::DuplicateNode(_)));
  }
}
