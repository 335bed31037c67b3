//! dagscout's own YAML DAG definitions.

use serde_yaml::Value;
use tracing::debug;

use super::{PipelineGraph, SourceLocation, line_of, node_id};
use crate::config::DagConfig;

/// Add the tasks of a YAML DAG definition to the graph.
///
/// Documents that do not have the shape of a DAG definition are skipped.
/// No validation beyond the shape happens here; `dagscout validate` does that.
pub fn extract(doc: &Value, content: &str, file: &str, graph: &mut PipelineGraph) {
    if doc.get("tasks").is_none() {
        return;
    }
    let config: DagConfig = match serde_yaml::from_value(doc.clone()) {
        Ok(config) => config,
        Err(e) => {
            debug!(file = %file, error = %e, "not a DAG definition");
            return;
        }
    };

    for task in &config.tasks {
        let id = node_id(file, &task.id);
        let line = line_of(content, |l| {
            l.strip_prefix("- id:")
                .is_some_and(|v| v.trim().trim_matches(['"', '\'']) == task.id)
        });
        graph.define(
            &id,
            &task.id,
            SourceLocation {
                file: file.to_string(),
                line,
            },
        );

        for dep in &task.depends_on {
            let dep_id = node_id(file, dep);
            graph.add_node(&dep_id, dep);
            graph.add_edge(&dep_id, &id);
        }
    }
}
