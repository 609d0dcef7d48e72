//! Graph materialization and simplification.
//!
//! # Overview
//!
//! [`FlowGraph`] turns a [`RawFlow`] into a petgraph [`StableDiGraph`] keyed
//! by string node id, classifies entities, and removes nodes that add nothing
//! to the diagram. `StableDiGraph` keeps indices valid across removals, and
//! removing a node drops its edges on both sides in one call.
//!
//! ## Passes
//!
//! 1. **Primary classification**: entities with no incoming edge are raw
//!    inputs (`primary`); every other entity is `derived`.
//! 2. **Anonymous elision**: each unnamed carrier between chained steps has
//!    exactly one predecessor and one successor; it is replaced by a direct
//!    step-to-step edge.
//! 3. **Synonym collapse**: a derived entity whose nearest entity ancestor,
//!    reached by climbing through single-input single-output steps, has the
//!    same name is a re-emergence of that entity (`carrot | peel > carrot`).
//!    It is replaced by an edge from its producer to its consumer. Repeated
//!    until a full scan removes nothing.

#![allow(clippy::module_name_repetitions)]

use std::collections::HashMap;

use petgraph::{
    Direction,
    stable_graph::{NodeIndex, StableDiGraph},
    visit::EdgeRef,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{FlowError, Result};
use crate::flow::build::RawFlow;
use crate::flow::manifest::Manifest;

// ---------------------------------------------------------------------------
// Node and edge weights
// ---------------------------------------------------------------------------

/// Node classification exposed to renderers as the `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Primary,
    Derived,
    Step,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Derived => "derived",
            Self::Step => "step",
        }
    }

    #[must_use]
    pub const fn is_entity(self) -> bool {
        !matches!(self, Self::Step)
    }
}

/// A node of the flow graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Entity or step name; `None` only for anonymous carriers.
    pub name: Option<String>,
    pub qualifier: Option<String>,
    pub arguments: Vec<String>,
}

impl GraphNode {
    /// Display label: the name, followed by one argument per line for steps.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.name.as_deref().unwrap_or_default();
        if self.arguments.is_empty() {
            name.to_string()
        } else {
            let mut label = name.to_string();
            for arg in &self.arguments {
                label.push('\n');
                label.push_str(arg);
            }
            label
        }
    }
}

/// Edge weight; the label carries an input qualifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphEdge {
    pub label: Option<String>,
}

/// Node counts removed by [`FlowGraph::simplify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimplifyReport {
    pub anonymous_removed: usize,
    pub synonyms_removed: usize,
}

impl SimplifyReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.anonymous_removed + self.synonyms_removed
    }
}

// ---------------------------------------------------------------------------
// FlowGraph
// ---------------------------------------------------------------------------

/// Directed flow graph keyed by node id.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    graph: StableDiGraph<GraphNode, GraphEdge>,
    node_map: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    /// Materialize a raw flow and classify its entities.
    ///
    /// Entities are inserted before steps, each group in build order. A
    /// repeated `(source, target)` pair keeps the first edge.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvariantViolation`] if an id is used twice or an
    /// edge names an unknown node.
    pub fn from_raw(raw: &RawFlow) -> Result<Self> {
        let mut graph = StableDiGraph::with_capacity(
            raw.entities.len() + raw.steps.len(),
            raw.edges.len(),
        );
        let mut node_map = HashMap::with_capacity(raw.entities.len() + raw.steps.len());

        let entities = raw.entities.iter().map(|e| GraphNode {
            id: e.id.clone(),
            kind: NodeKind::Derived,
            name: e.name.clone(),
            qualifier: e.qualifier.clone(),
            arguments: Vec::new(),
        });
        let steps = raw.steps.iter().map(|s| GraphNode {
            id: s.id.clone(),
            kind: NodeKind::Step,
            name: Some(s.name.clone()),
            qualifier: None,
            arguments: s.arguments.clone(),
        });

        for node in entities.chain(steps) {
            let id = node.id.clone();
            let idx = graph.add_node(node);
            if node_map.insert(id.clone(), idx).is_some() {
                return Err(FlowError::InvariantViolation {
                    node: id,
                    reason: "node id inserted twice".to_string(),
                });
            }
        }

        for edge in &raw.edges {
            let lookup = |id: &str| {
                node_map
                    .get(id)
                    .copied()
                    .ok_or_else(|| FlowError::InvariantViolation {
                        node: id.to_string(),
                        reason: "edge endpoint is not a node".to_string(),
                    })
            };
            let (source, target) = (lookup(&edge.source)?, lookup(&edge.target)?);
            if graph.find_edge(source, target).is_none() {
                graph.add_edge(
                    source,
                    target,
                    GraphEdge {
                        label: edge.label.clone(),
                    },
                );
            }
        }

        let mut flow = Self { graph, node_map };
        flow.classify();
        Ok(flow)
    }

    /// Run anonymous elision then synonym collapse to a fixed point.
    ///
    /// Calling this on an already simplified graph removes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvariantViolation`] if an anonymous carrier does
    /// not have exactly one predecessor and one successor, or if a cycle is
    /// found while climbing through steps.
    #[instrument(skip(self), fields(nodes = self.node_count()))]
    pub fn simplify(&mut self) -> Result<SimplifyReport> {
        let anonymous_removed = self.elide_anonymous()?;
        let synonyms_removed = self.collapse_synonyms()?;
        let report = SimplifyReport {
            anonymous_removed,
            synonyms_removed,
        };
        debug!(?report, nodes = self.node_count(), "graph simplified");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index(id).and_then(|idx| self.graph.node_weight(idx))
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index(id).is_some()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// All edges as `(source id, target id, label)` in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, Option<&str>)> {
        self.graph.edge_indices().filter_map(|e| {
            let (source, target) = self.graph.edge_endpoints(e)?;
            let weight = self.graph.edge_weight(e)?;
            Some((
                self.graph[source].id.as_str(),
                self.graph[target].id.as_str(),
                weight.label.as_deref(),
            ))
        })
    }

    /// The edge between two node ids, if present.
    #[must_use]
    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        let edge = self.graph.find_edge(self.index(source)?, self.index(target)?)?;
        self.graph.edge_weight(edge)
    }

    #[must_use]
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        self.neighbor_ids(id, Direction::Incoming)
    }

    #[must_use]
    pub fn successors(&self, id: &str) -> Vec<&str> {
        self.neighbor_ids(id, Direction::Outgoing)
    }

    /// Primary entity names and qualifiers, in insertion order.
    #[must_use]
    pub fn manifest(&self) -> Manifest {
        self.nodes()
            .filter(|n| n.kind == NodeKind::Primary)
            .map(|n| (n.label(), n.qualifier.clone()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    fn classify(&mut self) {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        for idx in indices {
            let is_source = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .next()
                .is_none();
            let node = &mut self.graph[idx];
            if node.kind.is_entity() {
                node.kind = if is_source {
                    NodeKind::Primary
                } else {
                    NodeKind::Derived
                };
            }
        }
    }

    fn elide_anonymous(&mut self) -> Result<usize> {
        let carriers: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                let node = &self.graph[idx];
                node.kind.is_entity() && node.name.is_none()
            })
            .collect();

        for &idx in &carriers {
            let preds = self.neighbors(idx, Direction::Incoming);
            let succs = self.neighbors(idx, Direction::Outgoing);
            let (&[pred], &[succ]) = (preds.as_slice(), succs.as_slice()) else {
                return Err(FlowError::InvariantViolation {
                    node: self.graph[idx].id.clone(),
                    reason: format!(
                        "anonymous carrier has {} predecessors and {} successors, expected 1 and 1",
                        preds.len(),
                        succs.len()
                    ),
                });
            };
            debug!(node = %self.graph[idx].id, "eliding anonymous carrier");
            self.remove(idx);
            self.connect(pred, succ, None);
        }
        Ok(carriers.len())
    }

    fn collapse_synonyms(&mut self) -> Result<usize> {
        let mut removed = 0;
        loop {
            let candidates: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|&idx| self.graph[idx].kind == NodeKind::Derived)
                .collect();

            let mut found = None;
            for idx in candidates {
                if let Some(rewire) = self.synonym_rewire(idx)? {
                    found = Some((idx, rewire));
                    break;
                }
            }
            let Some((idx, (pred, succ, label))) = found else {
                return Ok(removed);
            };

            debug!(node = %self.graph[idx].id, "collapsing synonym");
            self.remove(idx);
            self.connect(pred, succ, label);
            removed += 1;
        }
    }

    /// If `idx` re-emerges an ancestor of the same name, return its direct
    /// predecessor, direct successor, and the label of its outgoing edge.
    fn synonym_rewire(
        &self,
        idx: NodeIndex,
    ) -> Result<Option<(NodeIndex, NodeIndex, Option<String>)>> {
        let name = &self.graph[idx].name;
        let Some((first_pred, first_succ)) = self.single_neighbors(idx) else {
            return Ok(None);
        };

        let mut scope = idx;
        let mut pred = first_pred;
        // The graph is acyclic when built from flow lines; the bound guards
        // hand-assembled raw flows.
        for _ in 0..self.graph.node_count() {
            if self.graph[pred].kind.is_entity() {
                if self.graph[pred].name != *name {
                    return Ok(None);
                }
                let label = self
                    .graph
                    .find_edge(idx, first_succ)
                    .and_then(|e| self.graph.edge_weight(e))
                    .and_then(|w| w.label.clone());
                return Ok(Some((first_pred, first_succ, label)));
            }
            scope = pred;
            match self.single_neighbors(scope) {
                Some((next, _)) => pred = next,
                None => return Ok(None),
            }
        }

        Err(FlowError::InvariantViolation {
            node: self.graph[scope].id.clone(),
            reason: "cycle found while climbing through steps".to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn index(&self, id: &str) -> Option<NodeIndex> {
        self.node_map.get(id).copied()
    }

    fn neighbors(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, dir).collect()
    }

    fn neighbor_ids(&self, id: &str, dir: Direction) -> Vec<&str> {
        let Some(idx) = self.index(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = if dir == Direction::Incoming {
                    e.source()
                } else {
                    e.target()
                };
                self.graph[other].id.as_str()
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The sole predecessor and successor of `idx`, if it has exactly one each.
    fn single_neighbors(&self, idx: NodeIndex) -> Option<(NodeIndex, NodeIndex)> {
        let mut preds = self.graph.neighbors_directed(idx, Direction::Incoming);
        let mut succs = self.graph.neighbors_directed(idx, Direction::Outgoing);
        match (preds.next(), preds.next(), succs.next(), succs.next()) {
            (Some(pred), None, Some(succ), None) => Some((pred, succ)),
            _ => None,
        }
    }

    fn remove(&mut self, idx: NodeIndex) {
        if let Some(node) = self.graph.remove_node(idx) {
            self.node_map.remove(&node.id);
        }
    }

    /// Add `source -> target` unless present; an existing unlabelled edge
    /// takes `label`.
    fn connect(&mut self, source: NodeIndex, target: NodeIndex, label: Option<String>) {
        match self.graph.find_edge(source, target) {
            None => {
                self.graph.add_edge(source, target, GraphEdge { label });
            }
            Some(edge) => {
                if let Some(weight) = self
                    .graph
                    .edge_weight_mut(edge)
                    .filter(|w| w.label.is_none())
                {
                    weight.label = label;
                }
            }
        }
    }
}

/// Materialize and fully simplify a raw flow.
///
/// # Errors
///
/// See [`FlowGraph::from_raw`] and [`FlowGraph::simplify`].
pub fn simplify(raw: &RawFlow) -> Result<FlowGraph> {
    let mut graph = FlowGraph::from_raw(raw)?;
    graph.simplify()?;
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
