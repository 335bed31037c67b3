//! Workspace scanning tests.
//!
//! Builds a scratch workspace mixing Airflow, Prefect, dbt, GitHub Actions
//! and dagscout YAML sources, then checks the merged graph.

use crate::common::Workspace;
use dagscout::scan::node_id;
use dagscout::{PipelineGraph, ScanConfig, ScanError, YamlLoader, mermaid, scan_workspace};

fn mixed_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.copy_fixture("example_dag.py", "dags/example_dag.py");
    ws.copy_fixture("example_dag.yaml", "pipelines/example.yaml");
    ws.write(
        "flows/etl.py",
        "from prefect import flow, task\n\n@task\ndef extract():\n    return 1\n",
    );
    ws.write(
        "models/orders.sql",
        "select *\nfrom {{ ref('stg_orders') }}\n",
    );
    ws.write(
        "models/staging/stg_orders.sql",
        "select * from raw.orders\n",
    );
    ws.write(
        "models/schema.yml",
        "version: 2\nmodels:\n  - name: orders\n",
    );
    ws.write(
        ".github/workflows/ci.yml",
        "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n  test:\n    needs: build\n    runs-on: ubuntu-latest\n",
    );
    ws.write(
        "node_modules/pkg/vendored_dag.py",
        "t9 = BashOperator(task_id='t9', bash_command='true')\n",
    );
    ws.write("scripts/notes.py", "print('t1 >> t2')\n");
    ws
}

fn labels(graph: &PipelineGraph) -> Vec<&str> {
    graph.nodes().iter().map(|n| n.label.as_str()).collect()
}

fn locate(graph: &PipelineGraph, label: &str) -> Vec<String> {
    graph
        .find_by_label(label)
        .into_iter()
        .filter_map(|(_, location)| location.map(|l| l.to_string()))
        .collect()
}

#[test]
fn test_mixed_workspace_nodes_in_processing_order() {
    let ws = mixed_workspace();
    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();

    assert_eq!(
        labels(&graph),
        vec![
            "t1",
            "t2",
            "t3",
            "extract",
            "orders",
            "stg_orders",
            "build",
            "test",
            "print_date",
            "sleep",
            "echo_hello",
        ]
    );
    assert_eq!(graph.edges().len(), 6);
}

#[test]
fn test_mixed_workspace_edges() {
    let ws = mixed_workspace();
    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();

    let has_edge = |from: String, to: String| {
        graph
            .edges()
            .iter()
            .any(|e| e.from == from && e.to == to)
    };

    let airflow = |var: &str| node_id("dags/example_dag.py", var);
    assert!(has_edge(airflow("t1"), airflow("t2")));
    assert!(has_edge(airflow("t2"), airflow("t3")));
    assert!(has_edge(node_id("dbt", "stg_orders"), node_id("dbt", "orders")));

    let ci = |job: &str| node_id(".github/workflows/ci.yml", job);
    assert!(has_edge(ci("build"), ci("test")));

    let native = |task: &str| node_id("pipelines/example.yaml", task);
    assert!(has_edge(native("print_date"), native("sleep")));
    assert!(has_edge(native("sleep"), native("echo_hello")));
}

#[test]
fn test_locations() {
    let ws = mixed_workspace();
    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();

    assert_eq!(locate(&graph, "t2"), vec!["dags/example_dag.py:17"]);
    assert_eq!(locate(&graph, "extract"), vec!["flows/etl.py:4"]);
    // the defining model file wins over the file that refs it
    assert_eq!(
        locate(&graph, "stg_orders"),
        vec!["models/staging/stg_orders.sql:1"]
    );
    assert_eq!(locate(&graph, "orders"), vec!["models/orders.sql:1"]);
    assert_eq!(locate(&graph, "test"), vec![".github/workflows/ci.yml:5"]);
    assert_eq!(locate(&graph, "sleep"), vec!["pipelines/example.yaml:8"]);
    assert!(locate(&graph, "t9").is_empty());
}

#[test]
fn test_source_toggles() {
    let ws = mixed_workspace();
    let config = YamlLoader::parse_scan_config(
        "sources:\n  dbt: false\n  github_actions: false\n  dagscout: false\n",
    )
    .unwrap();

    let graph = scan_workspace(ws.root(), &config).unwrap();
    assert_eq!(labels(&graph), vec!["t1", "t2", "t3", "extract"]);
}

#[test]
fn test_ignore_dirs_from_config() {
    let ws = mixed_workspace();
    let config = YamlLoader::parse_scan_config("ignore_dirs: [dags, models, .github]\n").unwrap();

    let graph = scan_workspace(ws.root(), &config).unwrap();

    // node_modules is no longer ignored once the list is replaced
    assert_eq!(
        labels(&graph),
        vec!["extract", "t9", "print_date", "sleep", "echo_hello"]
    );
}

#[test]
fn test_large_files_are_skipped() {
    let ws = mixed_workspace();
    let config = ScanConfig {
        max_file_bytes: 8,
        ..ScanConfig::default()
    };

    let graph = scan_workspace(ws.root(), &config).unwrap();
    assert!(graph.is_empty());
}

#[test]
fn test_settings_file_and_broken_yaml_are_harmless() {
    let ws = Workspace::new();
    ws.write("dagscout.yaml", "ignore_dirs: [build]\n");
    ws.write("broken.yml", "jobs: [unclosed\n");
    ws.write(
        "ci.yml",
        "jobs:\n  lint:\n    runs-on: ubuntu-latest\n",
    );

    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();
    assert_eq!(labels(&graph), vec!["lint"]);
}

#[test]
fn test_mermaid_output_shape() {
    let ws = mixed_workspace();
    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();
    let chart = mermaid(&graph);
    let lines: Vec<&str> = chart.lines().collect();

    assert_eq!(lines[0], "flowchart TD");
    assert_eq!(lines.len(), 1 + 11 + 6);

    let t1 = node_id("dags/example_dag.py", "t1");
    let t2 = node_id("dags/example_dag.py", "t2");
    assert_eq!(lines[1], format!("  {}[\"t1\"]", t1));
    assert_eq!(lines[12], format!("  {} --> {}", t1, t2));
    assert!(lines[1..12].iter().all(|l| l.starts_with("  n") && l.ends_with("\"]")));
    assert!(lines[12..].iter().all(|l| l.contains(" --> ")));
}

#[test]
fn test_graph_json() {
    let ws = mixed_workspace();
    let graph = scan_workspace(ws.root(), &ScanConfig::default()).unwrap();
    let json = serde_json::to_value(&graph).unwrap();

    assert_eq!(json["nodes"].as_array().unwrap().len(), 11);
    assert_eq!(json["edges"].as_array().unwrap().len(), 6);
    let t3 = node_id("dags/example_dag.py", "t3");
    assert_eq!(json["mapping"][&t3]["file"], "dags/example_dag.py");
    assert_eq!(json["mapping"][&t3]["line"], 22);
    assert!(json.get("positions").is_none());
}

#[test]
fn test_missing_root() {
    let ws = Workspace::new();
    let result = scan_workspace(ws.root().join("missing"), &ScanConfig::default());
    assert!(matches!(result, Err(ScanError::NotADirectory(_))));
}
