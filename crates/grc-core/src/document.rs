//! Flow documents: an optional YAML metadata block and a flow body.
//!
//! ```text
//! name: Glazed carrots
//! serves: 4
//! ----
//! carrot[500 g], butter[30 g], sugar[1 tbsp]
//! carrot | peel | slice[5 mm]
//! carrot, butter, sugar | glaze[12 min] > glazed   # lid on
//! ```
//!
//! The first line starting with `----` ends the metadata block. Without a
//! separator the whole text is the flow body. Blank lines are dropped before
//! flow lines are numbered, so node ids do not depend on spacing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{FlowError, Result};
use crate::flow::{CommentAnchor, FlowBuilder, FlowGraph, Manifest, RawFlow, SimplifyReport};

/// Prefix marking the metadata separator line.
pub const SEPARATOR: &str = "----";

/// Document metadata. Only `name` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A retained body line and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLine {
    /// 1-based line number in the document text.
    pub source_line: usize,
    pub text: String,
}

/// A parsed but not yet compiled document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub metadata: Option<Metadata>,
    pub lines: Vec<FlowLine>,
}

/// The result of compiling a document.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub metadata: Option<Metadata>,
    pub graph: FlowGraph,
    pub comments: Vec<CommentAnchor>,
    pub manifest: Manifest,
    pub report: SimplifyReport,
}

impl Document {
    /// Split `text` into metadata and flow lines.
    ///
    /// # Errors
    ///
    /// - [`FlowError::Metadata`] if the block above the separator is not a
    ///   YAML mapping with a string `name`.
    /// - [`FlowError::EmptyFlow`] if no flow lines remain.
    #[instrument(skip_all)]
    pub fn parse(text: &str) -> Result<Self> {
        let numbered: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end()))
            .collect();

        let separator = numbered
            .iter()
            .position(|(_, line)| line.trim_start().starts_with(SEPARATOR));

        let (metadata, body) = match separator {
            Some(at) => {
                let block: Vec<&str> = numbered[..at].iter().map(|(_, l)| *l).collect();
                let metadata = serde_yaml::from_str::<Metadata>(&block.join("\n"))
                    .map_err(|e| FlowError::Metadata(e.to_string()))?;
                (Some(metadata), &numbered[at + 1..])
            }
            None => (None, numbered.as_slice()),
        };

        let lines: Vec<FlowLine> = body
            .iter()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| FlowLine {
                source_line: *n,
                text: (*line).to_string(),
            })
            .collect();

        if lines.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        debug!(
            lines = lines.len(),
            has_metadata = metadata.is_some(),
            "document parsed"
        );
        Ok(Self { metadata, lines })
    }

    /// Document name from metadata, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.name.as_str())
    }

    /// Source line number of the `flow_line`-th (1-based) flow line.
    #[must_use]
    pub fn source_line(&self, flow_line: usize) -> Option<usize> {
        flow_line
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|l| l.source_line)
    }

    /// Run the flow builder over the body.
    ///
    /// # Errors
    ///
    /// Returns the first builder error; see [`FlowBuilder::push_record`].
    pub fn build(&self) -> Result<RawFlow> {
        let mut builder = FlowBuilder::new();
        for line in &self.lines {
            builder.push_line(&line.text)?;
        }
        Ok(builder.finish())
    }

    /// Build, materialize and optionally simplify the flow.
    ///
    /// # Errors
    ///
    /// Returns builder and simplifier errors, and
    /// [`FlowError::InvariantViolation`] if a comment anchor does not name a
    /// node of the final graph.
    pub fn compile(&self, simplify: bool) -> Result<Compiled> {
        let raw = self.build()?;
        let mut graph = FlowGraph::from_raw(&raw)?;
        let report = if simplify {
            graph.simplify()?
        } else {
            SimplifyReport::default()
        };

        for anchor in &raw.comments {
            for id in [&anchor.start_node, &anchor.end_node] {
                if !graph.contains(id) {
                    return Err(FlowError::InvariantViolation {
                        node: id.clone(),
                        reason: "comment anchor does not name a node of the final graph"
                            .to_string(),
                    });
                }
            }
        }

        let manifest = graph.manifest();
        Ok(Compiled {
            metadata: self.metadata.clone(),
            graph,
            comments: raw.comments,
            manifest,
            report,
        })
    }
}
