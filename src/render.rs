//! Mermaid flowchart rendering.

use std::fmt::Write;

use crate::core::dag::Dag;
use crate::scan::{PipelineGraph, node_id};

/// Render a scanned pipeline graph as a top-down Mermaid flowchart.
pub fn mermaid(graph: &PipelineGraph) -> String {
    flowchart(
        graph
            .nodes()
            .iter()
            .map(|n| (n.id.clone(), n.label.clone())),
        graph.edges().iter().map(|e| (e.from.clone(), e.to.clone())),
    )
}

/// Render a DAG as a top-down Mermaid flowchart, one node per task.
pub fn dag_mermaid(dag: &Dag) -> String {
    let id = |task: &str| node_id(dag.id().as_str(), task);
    flowchart(
        dag.tasks()
            .iter()
            .map(|t| (id(t.id().as_str()), t.id().to_string())),
        dag.edges()
            .iter()
            .map(|e| (id(e.upstream.as_str()), id(e.downstream.as_str()))),
    )
}

fn flowchart(
    nodes: impl Iterator<Item = (String, String)>,
    edges: impl Iterator<Item = (String, String)>,
) -> String {
    let mut out = String::from("flowchart TD");
    for (id, label) in nodes {
        let label = if label.is_empty() { id.as_str() } else { label.as_str() };
        let _ = write!(out, "\n  {}[\"{}\"]", id, escape(label));
    }
    for (from, to) in edges {
        let _ = write!(out, "\n  {} --> {}", from, to);
    }
    out
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::example_dag;
    use crate::scan::SourceLocation;

    #[test]
    fn test_graph_flowchart() {
        let mut graph = PipelineGraph::new();
        graph.define(
            "n1",
            "extract",
            SourceLocation {
                file: "a.py".into(),
                line: 1,
            },
        );
        graph.add_node("n2", "say \"hi\"");
        graph.add_edge("n1", "n2");

        assert_eq!(
            mermaid(&graph),
            "flowchart TD\n  n1[\"extract\"]\n  n2[\"say \\\"hi\\\"\"]\n  n1 --> n2"
        );
    }

    #[test]
    fn test_empty_label_falls_back_to_id() {
        let mut graph = PipelineGraph::new();
        graph.add_node("n7", "");
        assert_eq!(mermaid(&graph), "flowchart TD\n  n7[\"n7\"]");
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(mermaid(&PipelineGraph::new()), "flowchart TD");
    }

    #[test]
    fn test_example_dag_flowchart() {
        let dag = example_dag().unwrap();
        let chart = dag_mermaid(&dag);
        let lines: Vec<&str> = chart.lines().collect();

        let print_date = node_id("example_dag", "print_date");
        let sleep = node_id("example_dag", "sleep");
        let echo_hello = node_id("example_dag", "echo_hello");

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "flowchart TD");
        assert_eq!(lines[1], format!("  {}[\"print_date\"]", print_date));
        assert_eq!(lines[3], format!("  {}[\"echo_hello\"]", echo_hello));
        assert_eq!(lines[4], format!("  {} --> {}", print_date, sleep));
        assert_eq!(lines[5], format!("  {} --> {}", sleep, echo_hello));
    }
}
