use std::collections::BTreeSet;

use grc_core::flow::{FlowGraph, NodeKind, build_flow};
use grc_core::{EntityTerm, StepTerm, parse_entity_term, parse_step_term};
use proptest::prelude::*;

const POOL: usize = 6;

fn arb_ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9 ]{0,6}[a-z0-9])?"
}

/// One transformation line: input picks, step count, optional output picks.
fn arb_line() -> impl Strategy<Value = (BTreeSet<usize>, usize, Option<BTreeSet<usize>>)> {
    (
        prop::collection::btree_set(0..POOL, 1..4),
        1usize..4,
        prop::option::of(prop::collection::btree_set(0..POOL, 1..3)),
    )
}

/// A valid flow: every pool entity declared, then transformation lines.
fn arb_flow() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_line(), 1..8).prop_map(|lines| {
        let declared: Vec<String> = (0..POOL).map(|i| format!("e{i}[{i} g]")).collect();
        let mut flow = vec![declared.join(", ")];
        for (j, (inputs, steps, outputs)) in lines.into_iter().enumerate() {
            let inputs: Vec<String> = inputs.iter().map(|i| format!("e{i}")).collect();
            let chain: Vec<String> = (0..steps).map(|k| format!("S{j}x{k}")).collect();
            let mut line = format!("{} | {}", inputs.join(", "), chain.join(" | "));
            if let Some(outputs) = outputs {
                let outputs: Vec<String> = outputs.iter().map(|i| format!("e{i}")).collect();
                line.push_str(" > ");
                line.push_str(&outputs.join(", "));
            }
            flow.push(line);
        }
        flow
    })
}

fn in_degree(graph: &FlowGraph, id: &str) -> usize {
    graph.predecessors(id).len()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn entity_term_display_parses_back(name in arb_ident(), qualifier in prop::option::of(arb_text())) {
        let term = EntityTerm { name, qualifier };
        prop_assert_eq!(parse_entity_term(&term.to_string()).unwrap(), term);
    }

    #[test]
    fn step_term_display_parses_back(name in arb_ident(), arguments in prop::collection::vec(arb_text(), 0..4)) {
        let term = StepTerm { name, arguments };
        prop_assert_eq!(parse_step_term(&term.to_string()).unwrap(), term);
    }

    #[test]
    fn primary_iff_no_incoming_edge(flow in arb_flow()) {
        let raw = build_flow(&flow).unwrap();
        let mut graph = FlowGraph::from_raw(&raw).unwrap();
        for node in graph.nodes().filter(|n| n.kind.is_entity()) {
            prop_assert_eq!(node.kind == NodeKind::Primary, in_degree(&graph, &node.id) == 0);
        }

        graph.simplify().unwrap();
        for node in graph.nodes().filter(|n| n.kind.is_entity()) {
            prop_assert_eq!(node.kind == NodeKind::Primary, in_degree(&graph, &node.id) == 0);
        }
    }

    #[test]
    fn simplified_graph_has_no_anonymous_carriers(flow in arb_flow()) {
        let raw = build_flow(&flow).unwrap();
        let mut graph = FlowGraph::from_raw(&raw).unwrap();
        let before = graph.node_count();

        let report = graph.simplify().unwrap();

        prop_assert!(graph.nodes().all(|n| n.name.is_some()));
        prop_assert_eq!(graph.node_count(), before - report.total());
        prop_assert_eq!(
            graph.nodes().filter(|n| n.kind == NodeKind::Step).count(),
            raw.steps.len()
        );
    }

    #[test]
    fn simplify_is_idempotent(flow in arb_flow()) {
        let raw = build_flow(&flow).unwrap();
        let mut graph = FlowGraph::from_raw(&raw).unwrap();
        graph.simplify().unwrap();
        let nodes: Vec<String> = graph.nodes().map(|n| n.id.clone()).collect();
        let edges = graph.edge_count();

        let again = graph.simplify().unwrap();

        prop_assert_eq!(again.total(), 0);
        prop_assert_eq!(graph.nodes().map(|n| n.id.clone()).collect::<Vec<_>>(), nodes);
        prop_assert_eq!(graph.edge_count(), edges);
    }

    #[test]
    fn manifest_lists_every_declaration(flow in arb_flow()) {
        let raw = build_flow(&flow).unwrap();
        let manifest = FlowGraph::from_raw(&raw).unwrap().manifest();

        let names: Vec<&str> = manifest.iter().map(|e| e.name.as_str()).collect();
        let expected: Vec<String> = (0..POOL).map(|i| format!("e{i}")).collect();
        prop_assert_eq!(names, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
