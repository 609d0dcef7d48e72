//! Flow graph construction from parsed lines.
//!
//! # Overview
//!
//! [`FlowBuilder`] walks flow lines in order and emits raw node and edge
//! lists. It keeps a [`Bindings`] table mapping each entity name to the node
//! that currently represents it, so a later line consuming `dough` is wired
//! to whichever step last produced `dough`.
//!
//! ## Node ids
//!
//! ```text
//! {name}_0_0          entity introduced by a declaration line
//! {step}_{j}_{k}      k-th step of flow line j (1-based j, 0-based k)
//! {name}_{j}_{k}      output of that step
//! anonymous_{j}_{k}   unnamed carrier between step k and step k+1
//! ```
//!
//! ## Edges
//!
//! The first step of a line receives one edge from every input, labelled
//! with the input's qualifier. Every other edge is unlabelled. Output
//! qualifiers are dropped: an amount only describes what goes *into* a step.

#![allow(clippy::module_name_repetitions)]

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{FlowError, Result};
use crate::line::{LineRecord, parse_line, pass_through};
use crate::term::{EntityTerm, StepTerm};

/// Base name given to unnamed carriers between chained steps.
pub const ANONYMOUS: &str = "anonymous";

/// Format a node id from its base name and position.
#[must_use]
pub fn node_id(base: &str, line: usize, step: usize) -> String {
    format!("{base}_{line}_{step}")
}

// ---------------------------------------------------------------------------
// Raw output
// ---------------------------------------------------------------------------

/// An entity node. `name` is `None` for anonymous carriers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityNode {
    pub id: String,
    pub name: Option<String>,
    pub qualifier: Option<String>,
}

/// A step node with its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepNode {
    pub id: String,
    pub name: String,
    pub arguments: Vec<String>,
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FlowEdge {
    fn new(source: &str, target: &str, label: Option<String>) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            label,
        }
    }
}

/// A comment attached to the first and last step of the line carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentAnchor {
    pub text: String,
    pub start_node: String,
    pub end_node: String,
}

/// Everything a build produces, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawFlow {
    pub entities: Vec<EntityNode>,
    pub steps: Vec<StepNode>,
    pub edges: Vec<FlowEdge>,
    pub comments: Vec<CommentAnchor>,
}

impl RawFlow {
    /// Look up an entity node by id.
    #[must_use]
    pub fn entity(&self, id: &str) -> Option<&EntityNode> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Look up a step node by id.
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&StepNode> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Entity name to the id of the node currently representing it.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    current: HashMap<String, String>,
}

impl Bindings {
    /// Current node id for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.current.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.current.contains_key(name)
    }

    /// All bound names, sorted for stable diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    fn bind(&mut self, name: &str, id: &str) {
        self.current.insert(name.to_string(), id.to_string());
    }
}

// ---------------------------------------------------------------------------
// FlowBuilder
// ---------------------------------------------------------------------------

/// Stateful builder fed one flow line at a time.
#[derive(Debug, Default)]
pub struct FlowBuilder {
    bindings: Bindings,
    ids: HashSet<String>,
    flow: RawFlow,
    line: usize,
}

impl FlowBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings as of the last processed line.
    #[must_use]
    pub const fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Number of lines processed so far.
    #[must_use]
    pub const fn lines(&self) -> usize {
        self.line
    }

    /// Parse and process the next flow line.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Grammar`] if the line does not parse, and the
    /// errors of [`FlowBuilder::push_record`] otherwise.
    pub fn push_line(&mut self, text: &str) -> Result<()> {
        let line = self.line + 1;
        let record = parse_line(text).map_err(|source| FlowError::Grammar { line, source })?;
        self.push_record(&record)
    }

    /// Process the next already-parsed line.
    ///
    /// # Errors
    ///
    /// - [`FlowError::DuplicateEntity`] if a declaration repeats a bound name.
    /// - [`FlowError::UnboundEntity`] if an input has no current binding.
    /// - [`FlowError::NodeIdCollision`] if a generated id is already taken.
    pub fn push_record(&mut self, record: &LineRecord) -> Result<()> {
        self.line += 1;
        let Some(steps) = &record.steps else {
            return self.declare(&record.inputs);
        };
        match &record.outputs {
            Some(outputs) => self.transform(record, steps, outputs),
            None => self.transform(record, steps, &pass_through(&record.inputs)),
        }
    }

    /// Consume the builder, returning the raw flow.
    #[must_use]
    pub fn finish(self) -> RawFlow {
        self.flow
    }

    fn declare(&mut self, inputs: &[EntityTerm]) -> Result<()> {
        for term in inputs {
            if self.bindings.contains(&term.name) {
                return Err(FlowError::DuplicateEntity {
                    line: self.line,
                    name: term.name.clone(),
                    bound: self.bindings.names(),
                });
            }
            let id = node_id(&term.name, 0, 0);
            self.claim(&id)?;
            self.bindings.bind(&term.name, &id);
            debug!(line = self.line, name = %term.name, node = %id, "declared entity");
            self.flow.entities.push(EntityNode {
                id,
                name: Some(term.name.clone()),
                qualifier: term.qualifier.clone(),
            });
        }
        Ok(())
    }

    fn transform(
        &mut self,
        record: &LineRecord,
        steps: &[StepTerm],
        outputs: &[EntityTerm],
    ) -> Result<()> {
        let j = self.line;
        let sources = record
            .inputs
            .iter()
            .map(|term| {
                self.bindings
                    .get(&term.name)
                    .map(|id| (id.to_string(), term.qualifier.clone()))
                    .ok_or_else(|| FlowError::UnboundEntity {
                        line: j,
                        name: term.name.clone(),
                        bound: self.bindings.names(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut carrier = String::new();
        let mut first_step: Option<String> = None;
        let mut last_step = String::new();

        for (k, step) in steps.iter().enumerate() {
            let step_id = node_id(&step.name, j, k);
            self.claim(&step_id)?;
            self.flow.steps.push(StepNode {
                id: step_id.clone(),
                name: step.name.clone(),
                arguments: step.arguments.clone(),
            });

            if k == 0 {
                for (source, label) in &sources {
                    self.flow
                        .edges
                        .push(FlowEdge::new(source, &step_id, label.clone()));
                }
            } else {
                self.flow.edges.push(FlowEdge::new(&carrier, &step_id, None));
            }

            if k + 1 < steps.len() {
                carrier = node_id(ANONYMOUS, j, k);
                self.claim(&carrier)?;
                self.flow.entities.push(EntityNode {
                    id: carrier.clone(),
                    name: None,
                    qualifier: None,
                });
                self.flow.edges.push(FlowEdge::new(&step_id, &carrier, None));
            } else {
                for term in outputs {
                    let id = node_id(&term.name, j, k);
                    self.claim(&id)?;
                    self.bindings.bind(&term.name, &id);
                    debug!(line = j, name = %term.name, node = %id, "rebound entity");
                    self.flow.entities.push(EntityNode {
                        id: id.clone(),
                        name: Some(term.name.clone()),
                        qualifier: None,
                    });
                    self.flow.edges.push(FlowEdge::new(&step_id, &id, None));
                }
            }

            first_step.get_or_insert_with(|| step_id.clone());
            last_step = step_id;
        }

        if let (Some(text), Some(start_node)) = (&record.comment, first_step) {
            self.flow.comments.push(CommentAnchor {
                text: text.clone(),
                start_node,
                end_node: last_step,
            });
        }
        Ok(())
    }

    fn claim(&mut self, id: &str) -> Result<()> {
        if self.ids.insert(id.to_string()) {
            Ok(())
        } else {
            Err(FlowError::NodeIdCollision {
                line: self.line,
                id: id.to_string(),
            })
        }
    }
}

/// Build a raw flow from lines in file order.
///
/// Line `j` (1-based) of `lines` supplies the `_{j}_` part of node ids.
///
/// # Errors
///
/// Aborts on the first line that fails; see [`FlowBuilder::push_record`].
#[instrument(skip_all)]
pub fn build_flow<I, S>(lines: I) -> Result<RawFlow>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = FlowBuilder::new();
    for line in lines {
        builder.push_line(line.as_ref())?;
    }
    debug!(
        lines = builder.lines(),
        bindings = builder.bindings().len(),
        "flow built"
    );
    Ok(builder.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str, label: Option<&str>) -> FlowEdge {
        FlowEdge::new(source, target, label.map(str::to_string))
    }

    #[test]
    fn declaration_binds_entities() {
        let mut builder = FlowBuilder::new();
        builder.push_line("a[10g], b[20g]").unwrap();

        assert_eq!(builder.bindings().get("a"), Some("a_0_0"));
        assert_eq!(builder.bindings().get("b"), Some("b_0_0"));

        let flow = builder.finish();
        assert_eq!(
            flow.entities,
            vec![
                EntityNode {
                    id: "a_0_0".into(),
                    name: Some("a".into()),
                    qualifier: Some("10g".into()),
                },
                EntityNode {
                    id: "b_0_0".into(),
                    name: Some("b".into()),
                    qualifier: Some("20g".into()),
                },
            ]
        );
        assert!(flow.edges.is_empty());
        assert!(flow.steps.is_empty());
    }

    #[test]
    fn duplicate_declaration_fails() {
        let err = build_flow(["carrot", "carrot"]).unwrap_err();
        assert_eq!(
            err,
            FlowError::DuplicateEntity {
                line: 2,
                name: "carrot".into(),
                bound: vec!["carrot".into()],
            }
        );
    }

    #[test]
    fn duplicate_within_one_declaration_fails() {
        let err = build_flow(["salt, salt"]).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateEntity { line: 1, .. }));
    }

    #[test]
    fn unbound_input_fails_with_bound_names() {
        let err = build_flow(["a, b", "a, x | mix"]).unwrap_err();
        assert_eq!(
            err,
            FlowError::UnboundEntity {
                line: 2,
                name: "x".into(),
                bound: vec!["a".into(), "b".into()],
            }
        );
    }

    #[test]
    fn grammar_error_carries_line_number() {
        let err = build_flow(["a", "a | -bad"]).unwrap_err();
        assert!(matches!(err, FlowError::Grammar { line: 2, .. }));
    }

    #[test]
    fn single_step_wires_inputs_with_labels() {
        let flow = build_flow(["a[10g], b", "a[2 tbsp], b | mix > c"]).unwrap();

        assert_eq!(flow.steps.len(), 1);
        assert_eq!(flow.steps[0].id, "mix_2_0");
        assert_eq!(
            flow.edges,
            vec![
                edge("a_0_0", "mix_2_0", Some("2 tbsp")),
                edge("b_0_0", "mix_2_0", None),
                edge("mix_2_0", "c_2_0", None),
            ]
        );
    }

    #[test]
    fn chain_inserts_anonymous_carriers() {
        let flow = build_flow(["a, b", "a, b | P1 | P2[1 h] | P3 > c"]).unwrap();

        let ids: Vec<&str> = flow.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["a_0_0", "b_0_0", "anonymous_2_0", "anonymous_2_1", "c_2_2"]
        );
        assert!(flow.entity("anonymous_2_0").unwrap().name.is_none());
        assert!(flow.edges.contains(&edge("P1_2_0", "anonymous_2_0", None)));
        assert!(flow.edges.contains(&edge("anonymous_2_0", "P2_2_1", None)));
        assert!(flow.edges.contains(&edge("anonymous_2_1", "P3_2_2", None)));
        assert!(flow.edges.contains(&edge("P3_2_2", "c_2_2", None)));
        assert_eq!(flow.step("P2_2_1").unwrap().arguments, vec!["1 h"]);
    }

    #[test]
    fn pass_through_rebinds_inputs_without_qualifier() {
        let mut builder = FlowBuilder::new();
        builder.push_line("carrot[3]").unwrap();
        builder.push_line("carrot[3] | peel").unwrap();

        assert_eq!(builder.bindings().get("carrot"), Some("carrot_2_0"));
        let flow = builder.finish();
        let out = flow.entity("carrot_2_0").unwrap();
        assert_eq!(out.qualifier, None);
        assert!(flow.edges.contains(&edge("carrot_0_0", "peel_2_0", Some("3"))));
    }

    #[test]
    fn record_without_outputs_passes_inputs_through() {
        let mut builder = FlowBuilder::new();
        builder.push_line("carrot").unwrap();
        let record = LineRecord {
            inputs: vec![EntityTerm::new("carrot", None)],
            steps: Some(vec![StepTerm::new("peel", &[])]),
            outputs: None,
            comment: None,
        };
        builder.push_record(&record).unwrap();

        assert_eq!(builder.bindings().get("carrot"), Some("carrot_2_0"));
        let flow = builder.finish();
        assert!(flow.step("peel_2_0").is_some());
        assert!(flow.edges.contains(&edge("carrot_0_0", "peel_2_0", None)));
        assert!(flow.edges.contains(&edge("peel_2_0", "carrot_2_0", None)));
    }

    #[test]
    fn repeated_input_passes_through_once() {
        let flow = build_flow(["a", "a, a | mix"]).unwrap();
        let outputs: Vec<&str> = flow
            .entities
            .iter()
            .filter(|e| e.id.ends_with("_2_0"))
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(outputs, vec!["a_2_0"]);
        assert!(flow.edges.contains(&edge("mix_2_0", "a_2_0", None)));
    }

    #[test]
    fn later_lines_consume_latest_binding() {
        let flow = build_flow(["carrot", "carrot | peel", "carrot | chop"]).unwrap();
        assert!(flow.edges.contains(&edge("carrot_2_0", "chop_3_0", None)));
        assert!(!flow.edges.contains(&edge("carrot_0_0", "chop_3_0", None)));
    }

    #[test]
    fn comment_anchors_first_and_last_step() {
        let flow = build_flow(["a", "a | wash | peel | chop  # keep the skins"]).unwrap();
        assert_eq!(
            flow.comments,
            vec![CommentAnchor {
                text: "keep the skins".into(),
                start_node: "wash_2_0".into(),
                end_node: "chop_2_2".into(),
            }]
        );
    }

    #[test]
    fn declaration_comment_has_no_anchor() {
        let flow = build_flow(["a # raw"]).unwrap();
        assert!(flow.comments.is_empty());
    }

    #[test]
    fn step_sharing_output_name_collides() {
        let err = build_flow(["a, b", "a, b | mix > mix"]).unwrap_err();
        assert_eq!(
            err,
            FlowError::NodeIdCollision {
                line: 2,
                id: "mix_2_0".into(),
            }
        );
    }

    #[test]
    fn repeated_output_collides() {
        let err = build_flow(["a", "a | split > x, x"]).unwrap_err();
        assert!(matches!(err, FlowError::NodeIdCollision { line: 2, .. }));
    }

    #[test]
    fn unbound_input_does_not_disturb_bindings() {
        let mut builder = FlowBuilder::new();
        builder.push_line("a").unwrap();
        assert!(builder.push_line("a | mix > b, c").is_ok());
        assert!(builder.push_line("b, z | mix").is_err());
        assert_eq!(builder.bindings().get("b"), Some("b_2_0"));
    }
}
