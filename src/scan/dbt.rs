//! dbt projects: SQL models linked by `ref(...)`, plus schema YAML.
//!
//! Model names are global within a dbt project, so model nodes are keyed by
//! the shared `dbt` namespace rather than by file.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use super::{PipelineGraph, SourceLocation, line_of, node_id};

const NAMESPACE: &str = "dbt";

static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"ref\(\s*["']([\w.\-]+)["']\s*\)"#).unwrap());

/// Add the model defined by a `.sql` file and the models it refs.
pub fn extract_sql(content: &str, path: &Path, file: &str, graph: &mut PipelineGraph) {
    let Some(model) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return;
    };
    let model_id = node_id(NAMESPACE, model);
    graph.define(
        &model_id,
        model,
        SourceLocation {
            file: file.to_string(),
            line: 1,
        },
    );

    for (i, line) in content.lines().enumerate() {
        for caps in REF_RE.captures_iter(line) {
            let target = &caps[1];
            let target_id = node_id(NAMESPACE, target);
            graph.mention(
                &target_id,
                target,
                SourceLocation {
                    file: file.to_string(),
                    line: i + 1,
                },
            );
            graph.add_edge(&target_id, &model_id);
        }
    }
}

/// Add models listed under `models:` in a schema file.
pub fn extract_yaml(doc: &Value, content: &str, file: &str, graph: &mut PipelineGraph) {
    let Some(models) = doc.get("models").and_then(Value::as_sequence) else {
        return;
    };

    for name in models
        .iter()
        .filter_map(|model| model.get("name").and_then(Value::as_str))
    {
        let line = line_of(content, |l| {
            l.strip_prefix("- name:")
                .or_else(|| l.strip_prefix("name:"))
                .is_some_and(|v| v.trim().trim_matches(['"', '\'']) == name)
        });
        graph.mention(
            &node_id(NAMESPACE, name),
            name,
            SourceLocation {
                file: file.to_string(),
                line,
            },
        );
    }
}
