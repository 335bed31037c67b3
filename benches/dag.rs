//! Benchmarks for DAG operations.
//!
//! Measures the overhead of:
//! - DAG construction and validation
//! - Topological sorting
//! - Reading an Airflow file into a DAG

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dagscout::core::dag::{Dag, DagBuilder};
use dagscout::render::dag_mermaid;
use dagscout::scan::airflow;

fn builder(id: &str) -> DagBuilder {
    DagBuilder::new(id).start_date(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
}

/// Build a linear DAG: A -> B -> C -> ... -> N
fn build_linear_dag(size: usize) -> Dag {
    let mut builder = builder("linear");

    for i in 0..size {
        let name = format!("task_{}", i);
        if i == 0 {
            builder = builder.bash_task(&name, "true");
        } else {
            let prev = format!("task_{}", i - 1);
            builder = builder.bash_task_with_deps(&name, "true", &[&prev]);
        }
    }

    builder.build().unwrap()
}

/// Build a wide DAG: A -> [B, C, D, ...] (one root, many leaves)
fn build_wide_dag(size: usize) -> Dag {
    let mut builder = builder("wide").bash_task("root", "true");

    for i in 0..size {
        let name = format!("leaf_{}", i);
        builder = builder.bash_task_with_deps(&name, "true", &["root"]);
    }

    builder.build().unwrap()
}

/// Build a diamond DAG with layers:
///        A
///      / | \
///     B  C  D
///      \ | /
///        E
fn build_diamond_dag(width: usize) -> Dag {
    let mut builder = builder("diamond").bash_task("start", "true");

    let mut middle_names = Vec::new();
    for i in 0..width {
        let name = format!("middle_{}", i);
        middle_names.push(name.clone());
        builder = builder.bash_task_with_deps(&name, "true", &["start"]);
    }

    let refs: Vec<&str> = middle_names.iter().map(|s| s.as_str()).collect();
    builder = builder.bash_task_with_deps("end", "true", &refs);

    builder.build().unwrap()
}

/// Airflow source with `size` BashOperators chained in one `>>` statement.
fn airflow_source(size: usize) -> String {
    let mut source = String::from(
        "from airflow import DAG\nwith DAG(dag_id='bench', start_date=datetime(2025, 1, 1)) as dag:\n",
    );
    for i in 0..size {
        source.push_str(&format!(
            "    t{i} = BashOperator(\n        task_id='task_{i}',\n        bash_command='echo {i}'\n    )\n"
        ));
    }
    let chain: Vec<String> = (0..size).map(|i| format!("t{}", i)).collect();
    source.push_str(&format!("    {}\n", chain.join(" >> ")));
    source
}

fn bench_dag_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("dag_construction");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("linear", size), size, |b, &size| {
            b.iter(|| build_linear_dag(size));
        });

        group.bench_with_input(BenchmarkId::new("wide", size), size, |b, &size| {
            b.iter(|| build_wide_dag(size));
        });

        group.bench_with_input(BenchmarkId::new("diamond", size), size, |b, &size| {
            b.iter(|| build_diamond_dag(size));
        });
    }

    group.finish();
}

fn bench_topological_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_sort");

    for size in [100, 500].iter() {
        let linear_dag = build_linear_dag(*size);
        group.bench_with_input(BenchmarkId::new("linear", size), &linear_dag, |b, dag| {
            b.iter(|| dag.topological_sort().unwrap());
        });

        let wide_dag = build_wide_dag(*size);
        group.bench_with_input(BenchmarkId::new("wide", size), &wide_dag, |b, dag| {
            b.iter(|| dag.topological_sort().unwrap());
        });

        let diamond_dag = build_diamond_dag(*size);
        group.bench_with_input(BenchmarkId::new("diamond", size), &diamond_dag, |b, dag| {
            b.iter(|| dag.topological_sort().unwrap());
        });
    }

    group.finish();
}

fn bench_airflow_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("airflow_parse");

    for size in [10, 100].iter() {
        let source = airflow_source(*size);
        group.bench_with_input(BenchmarkId::new("chain", size), &source, |b, source| {
            b.iter(|| airflow::parse_dag(source).unwrap());
        });
    }

    group.finish();
}

fn bench_mermaid(c: &mut Criterion) {
    let dag = build_diamond_dag(500);
    c.bench_function("dag_mermaid/diamond/500", |b| b.iter(|| dag_mermaid(&dag)));
}

criterion_group!(
    benches,
    bench_dag_construction,
    bench_topological_sort,
    bench_airflow_parse,
    bench_mermaid
);

criterion_main!(benches);
