//! Flow graph module.
//!
//! # Pipeline
//!
//! ```text
//! flow lines
//!        ↓  build::build_flow()
//! RawFlow (entity nodes, step nodes, labelled edges, comment anchors)
//!        ↓  graph::FlowGraph::from_raw()
//! FlowGraph (primary / derived / step nodes)
//!        ↓  FlowGraph::simplify()
//! FlowGraph without anonymous carriers or synonym re-emergences
//!        ↓  FlowGraph::manifest()
//! Manifest (primary entity → qualifier)
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! use grc_core::flow::{build_flow, simplify};
//!
//! let raw = build_flow(["flour[200 g], water", "flour, water | knead | rest[1 h] > dough"])?;
//! let graph = simplify(&raw)?;
//!
//! assert!(graph.contains("dough_2_1"));
//! assert_eq!(graph.successors("knead_2_0"), vec!["rest_2_1"]);
//! assert_eq!(graph.manifest().get("flour"), Some(Some("200 g")));
//! # Ok::<(), grc_core::FlowError>(())
//! ```

pub mod build;
pub mod graph;
pub mod manifest;

// Re-export primary types at module level for convenience.
pub use build::{
    Bindings, CommentAnchor, EntityNode, FlowBuilder, FlowEdge, RawFlow, StepNode, build_flow,
};
pub use graph::{FlowGraph, GraphEdge, GraphNode, NodeKind, SimplifyReport, simplify};
pub use manifest::{Manifest, ManifestEntry};
