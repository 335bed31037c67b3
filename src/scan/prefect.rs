//! Prefect flows: every `@task`-decorated function is a node.

use std::sync::LazyLock;

use regex::Regex;

use super::{PipelineGraph, SourceLocation, node_id};

static DEF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"def\s+(\w+)").unwrap());

/// Add `@task` functions found in `content` to the graph.
pub fn extract(content: &str, file: &str, graph: &mut PipelineGraph) {
    let lines: Vec<&str> = content.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if !line.trim().starts_with("@task") {
            continue;
        }
        let Some(caps) = lines.get(i + 1).and_then(|next| DEF_RE.captures(next)) else {
            continue;
        };
        let name = &caps[1];
        graph.define(
            &node_id(file, name),
            name,
            SourceLocation {
                file: file.to_string(),
                line: i + 2,
            },
        );
    }
}
