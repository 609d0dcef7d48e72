//! Export views handed to layout and page-composition tools.
//!
//! - [`GraphView`] is the serializable contract: nodes with `type`, `label`,
//!   `qualifier` and `arguments`, labelled edges, comment anchors and the
//!   primary manifest.
//! - [`to_dot`] writes the same graph as Graphviz DOT text for a layout
//!   engine to place and draw.

use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::config::RenderConfig;
use crate::document::Compiled;
use crate::flow::{CommentAnchor, GraphNode, Manifest, NodeKind};

// ---------------------------------------------------------------------------
// Serializable view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NodeView<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<&'a str>,
    pub arguments: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeView<'a> {
    pub source: &'a str,
    pub target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'a str>,
}

/// Snapshot of a compiled document for external renderers.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub nodes: Vec<NodeView<'a>>,
    pub edges: Vec<EdgeView<'a>>,
    pub comments: &'a [CommentAnchor],
    pub manifest: &'a Manifest,
}

impl<'a> GraphView<'a> {
    #[must_use]
    pub fn new(compiled: &'a Compiled) -> Self {
        let nodes = compiled
            .graph
            .nodes()
            .map(|node| NodeView {
                id: &node.id,
                kind: node.kind,
                label: node.label(),
                qualifier: node.qualifier.as_deref(),
                arguments: &node.arguments,
            })
            .collect();
        let edges = compiled
            .graph
            .edges()
            .map(|(source, target, label)| EdgeView {
                source,
                target,
                label,
            })
            .collect();

        Self {
            name: compiled.metadata.as_ref().map(|m| m.name.as_str()),
            nodes,
            edges,
            comments: &compiled.comments,
            manifest: &compiled.manifest,
        }
    }

    /// Serialize as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

/// Render a compiled document as Graphviz DOT.
#[must_use]
pub fn to_dot(compiled: &Compiled, options: &RenderConfig) -> String {
    let mut out = String::new();
    let name = compiled
        .metadata
        .as_ref()
        .map_or("flow", |m| m.name.as_str());

    let _ = writeln!(out, "digraph {} {{", quote(name));
    let _ = writeln!(
        out,
        "  graph [rankdir={}, nodesep=0.05, ranksep=0.1, margin=0];",
        quote(&options.rankdir)
    );
    let _ = writeln!(out, "  node [margin=\"0.001\", width=\"0.01\"];");

    for node in compiled.graph.nodes() {
        let _ = writeln!(
            out,
            "  {} [type={}, label={}, {}];",
            quote(&node.id),
            quote(node.kind.as_str()),
            quote(&dot_label(node)),
            node_style(node.kind)
        );
    }

    for (source, target, label) in compiled.graph.edges() {
        match label {
            Some(label) => {
                let _ = writeln!(
                    out,
                    "  {} -> {} [label={}];",
                    quote(source),
                    quote(target),
                    quote(label)
                );
            }
            None => {
                let _ = writeln!(out, "  {} -> {};", quote(source), quote(target));
            }
        }
    }

    for (i, comment) in compiled.comments.iter().enumerate() {
        let text_id = format!("comment_{i}");
        let anchor_id = format!("comment_{i}_anchor");
        let text = wrap_words(&comment.text, options.comment_wrap).join("\n");
        let start = quote(&comment.start_node);

        let _ = writeln!(
            out,
            "  {} [label={}, shape=\"plaintext\", fontcolor=\"#f80000\"];",
            quote(&text_id),
            quote(&text)
        );
        let _ = writeln!(
            out,
            "  {} [label=\"\", width=\"0\", height=\"0\", style=\"invis\"];",
            quote(&anchor_id)
        );
        let _ = writeln!(
            out,
            "  {{ rank=same; {}; {}; {start}; }}",
            quote(&text_id),
            quote(&anchor_id)
        );
        let _ = writeln!(
            out,
            "  {} -> {} [style=\"invis\"];",
            quote(&anchor_id),
            quote(&text_id)
        );
        let _ = writeln!(
            out,
            "  {start} -> {} [style=\"dashed\", color=\"#f88877\", weight=\"100\"];",
            quote(&anchor_id)
        );
    }

    out.push_str("}\n");
    out
}

/// Primary entities show their amount under the name.
fn dot_label(node: &GraphNode) -> String {
    match (node.kind, &node.qualifier) {
        (NodeKind::Primary, Some(q)) => format!("{}\n{q}", node.label()),
        _ => node.label(),
    }
}

const fn node_style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Step => "shape=\"plaintext\"",
        NodeKind::Derived => "shape=\"octagon\", style=\"filled\", fillcolor=\"#7788f8\"",
        NodeKind::Primary => "shape=\"rectangle\", style=\"filled\", fillcolor=\"#99eef8\"",
    }
}

/// Quote a DOT id or attribute value.
fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Greedy word wrap; words longer than `width` are split.
#[must_use]
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(width) {
            let chunk: String = chunk.iter().collect();
            let len = chunk.chars().count();
            if current_len > 0 && current_len + 1 + len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(&chunk);
            current_len += len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn compiled(text: &str) -> Compiled {
        Document::parse(text).unwrap().compile(true).unwrap()
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_words("keep the lid on until the glaze thickens", 12);
        assert_eq!(lines, vec!["keep the lid", "on until the", "glaze", "thickens"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
    }

    #[test]
    fn wrap_splits_long_words() {
        assert_eq!(wrap_words("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(wrap_words("   ", 10).is_empty());
    }

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\"");
    }

    #[test]
    fn json_view_exposes_contract_fields() {
        let c = compiled("name: Toast\n----\nbread[2 slices]\nbread[1 slice] | toast[3 min] > toast_bread");
        let json: serde_json::Value =
            serde_json::from_str(&GraphView::new(&c).to_json().unwrap()).unwrap();

        assert_eq!(json["name"], "Toast");
        let nodes = json["nodes"].as_array().unwrap();
        let bread = nodes.iter().find(|n| n["id"] == "bread_0_0").unwrap();
        assert_eq!(bread["type"], "primary");
        assert_eq!(bread["qualifier"], "2 slices");
        let step = nodes.iter().find(|n| n["id"] == "toast_2_0").unwrap();
        assert_eq!(step["type"], "step");
        assert_eq!(step["label"], "toast\n3 min");
        assert_eq!(step["arguments"][0], "3 min");

        let edge = &json["edges"][0];
        assert_eq!(edge["source"], "bread_0_0");
        assert_eq!(edge["label"], "1 slice");
        assert_eq!(json["manifest"][0]["name"], "bread");
    }

    #[test]
    fn dot_styles_nodes_by_kind() {
        let c = compiled("salt[5 g], egg\negg, salt[3 g] | whisk > mix");
        let dot = to_dot(&c, &RenderConfig::default());

        assert!(dot.starts_with("digraph \"flow\" {"));
        assert!(dot.contains("rankdir=\"TB\""));
        assert!(dot.contains(
            "\"salt_0_0\" [type=\"primary\", label=\"salt\\n5 g\", shape=\"rectangle\""
        ));
        assert!(dot.contains("\"mix_2_0\" [type=\"derived\", label=\"mix\", shape=\"octagon\""));
        assert!(dot.contains("\"whisk_2_0\" [type=\"step\", label=\"whisk\", shape=\"plaintext\"]"));
        assert!(dot.contains("\"salt_0_0\" -> \"whisk_2_0\" [label=\"3 g\"];"));
        assert!(dot.contains("\"egg_0_0\" -> \"whisk_2_0\";"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn dot_anchors_comments_to_start_step() {
        let c = compiled("a\na | wash | dry  # pat gently with a towel");
        let options = RenderConfig {
            comment_wrap: 10,
            ..RenderConfig::default()
        };
        let dot = to_dot(&c, &options);

        assert!(dot.contains("\"comment_0\" [label=\"pat gently\\nwith a\\ntowel\""));
        assert!(dot.contains("{ rank=same; \"comment_0\"; \"comment_0_anchor\"; \"wash_2_0\"; }"));
        assert!(dot.contains("\"wash_2_0\" -> \"comment_0_anchor\" [style=\"dashed\""));
    }
}
