//! GitHub Actions workflows: jobs and their `needs`.

use serde_yaml::Value;

use super::{PipelineGraph, SourceLocation, node_id};

/// Add the jobs of a workflow document to the graph.
pub fn extract(doc: &Value, content: &str, file: &str, graph: &mut PipelineGraph) {
    let Some(jobs) = doc.get("jobs").and_then(Value::as_mapping) else {
        return;
    };

    for (key, job) in jobs {
        let Some(name) = key.as_str() else {
            continue;
        };
        let id = node_id(file, name);
        graph.define(
            &id,
            name,
            SourceLocation {
                file: file.to_string(),
                line: job_line(content, name),
            },
        );

        let needs: Vec<&str> = match job.get("needs") {
            Some(Value::String(need)) => vec![need.as_str()],
            Some(Value::Sequence(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for need in needs {
            let need_id = node_id(file, need);
            graph.add_node(&need_id, need);
            graph.add_edge(&need_id, &id);
        }
    }
}

/// Line of `name:` below the `jobs:` key; 1 if it cannot be found.
fn job_line(content: &str, name: &str) -> usize {
    let key = format!("{}:", name);
    let quoted = [format!("\"{}\":", name), format!("'{}':", name)];

    content
        .lines()
        .enumerate()
        .skip_while(|(_, line)| !line.starts_with("jobs:"))
        .skip(1)
        .find(|(_, line)| {
            let line = line.trim();
            line.starts_with(&key) || quoted.iter().any(|q| line.starts_with(q.as_str()))
        })
        .map(|(i, _)| i + 1)
        .unwrap_or(1)
}
