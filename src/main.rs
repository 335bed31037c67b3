//! dagscout - Declare shell-task DAGs and map the pipelines in a workspace.
//!
//! Usage:
//!   dagscout scan <root>           Print the pipeline graph of a workspace
//!   dagscout locate <root> <label> Print where a node is declared
//!   dagscout validate <path>       Validate DAG definitions
//!   dagscout show <path>           Show DAG definitions
//!   dagscout example               Show the bundled example DAG

use clap::{Parser, Subcommand, ValueEnum};
use dagscout::config::SCAN_CONFIG_FILE;
use dagscout::scan::airflow;
use dagscout::{
    Dag, ScanConfig, YamlLoader, dag_mermaid, example_dag, load_dag_file,
    load_dags_from_directory, mermaid, scan_workspace,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// dagscout - Declare shell-task DAGs and map the pipelines in a workspace
#[derive(Parser)]
#[command(name = "dagscout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a workspace and print its pipeline graph
    Scan {
        /// Workspace root
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = GraphFormat::Mermaid)]
        format: GraphFormat,

        /// Scanner settings (default: <ROOT>/dagscout.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the source location of every node with the given label
    Locate {
        /// Workspace root
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Node label, e.g. a task variable, dbt model or job name
        #[arg(value_name = "LABEL")]
        label: String,

        /// Scanner settings (default: <ROOT>/dagscout.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate a YAML definition, an Airflow file, or a directory of YAML definitions
    Validate {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show DAG metadata and tasks in execution order
    Show {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Print a Mermaid flowchart instead
        #[arg(long)]
        mermaid: bool,
    },

    /// Show the bundled example DAG
    Example {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = DagFormat::Text)]
        format: DagFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GraphFormat {
    Mermaid,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DagFormat {
    Text,
    Mermaid,
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            root,
            format,
            config,
        } => {
            scan(root, format, config)?;
        }
        Commands::Locate {
            root,
            label,
            config,
        } => {
            locate(root, label, config)?;
        }
        Commands::Validate { path } => {
            validate(path)?;
        }
        Commands::Show { path, mermaid } => {
            show(path, mermaid)?;
        }
        Commands::Example { format } => {
            example(format)?;
        }
    }

    Ok(())
}

/// Scanner settings from `--config`, else from the workspace root, else defaults.
fn scan_config(
    root: &Path,
    config: Option<PathBuf>,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config {
        info!("Using scanner settings from: {}", path.display());
        return Ok(YamlLoader::load_scan_config(&path)?);
    }

    let default_path = root.join(SCAN_CONFIG_FILE);
    if default_path.is_file() {
        info!("Using scanner settings from: {}", default_path.display());
        return Ok(YamlLoader::load_scan_config(&default_path)?);
    }

    Ok(ScanConfig::default())
}

/// Scan a workspace and print the graph.
fn scan(
    root: PathBuf,
    format: GraphFormat,
    config: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = scan_config(&root, config)?;
    let graph = scan_workspace(&root, &config)?;

    if graph.is_empty() {
        warn!("No pipeline nodes found in {}", root.display());
    }

    match format {
        GraphFormat::Mermaid => println!("{}", mermaid(&graph)),
        GraphFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
    }

    Ok(())
}

/// Print `file:line` for every node labelled `label`.
fn locate(
    root: PathBuf,
    label: String,
    config: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = scan_config(&root, config)?;
    let graph = scan_workspace(&root, &config)?;

    let found = graph.find_by_label(&label);
    if found.is_empty() {
        error!("No node labelled '{}' in {}", label, root.display());
        return Err(format!("node '{}' not found", label).into());
    }

    for (node, location) in found {
        match location {
            Some(location) => println!("{}", location),
            None => warn!("Node '{}' ({}) has no recorded location", node.label, node.id),
        }
    }

    Ok(())
}

/// Load the DAGs at `path`: a directory of YAML files, an Airflow `.py`
/// file, or a single YAML file.
fn load_dags(path: &Path) -> Result<Vec<Dag>, Box<dyn std::error::Error>> {
    if path.is_dir() {
        return Ok(load_dags_from_directory(path)?);
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("py") => Ok(vec![airflow::parse_dag_file(path)?]),
        _ => Ok(vec![load_dag_file(path)?]),
    }
}

/// Validate DAG definitions without printing them.
fn validate(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating DAGs in: {}", path.display());

    match load_dags(&path) {
        Ok(dags) => {
            info!("All {} DAG(s) are valid:", dags.len());
            for dag in &dags {
                info!("  - {} ({} task(s)): OK", dag.id(), dag.len());
            }
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e)
        }
    }
}

/// Print DAG definitions.
fn show(path: PathBuf, as_mermaid: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dags = load_dags(&path)?;

    if dags.is_empty() {
        println!("No DAGs found in {}", path.display());
        return Ok(());
    }

    for dag in &dags {
        if as_mermaid {
            println!("{}", dag_mermaid(dag));
        } else {
            print_dag(dag)?;
        }
        println!();
    }

    Ok(())
}

/// Print the bundled example DAG.
fn example(format: DagFormat) -> Result<(), Box<dyn std::error::Error>> {
    let dag = example_dag()?;

    match format {
        DagFormat::Text => print_dag(&dag)?,
        DagFormat::Mermaid => println!("{}", dag_mermaid(&dag)),
        DagFormat::Json => println!("{}", serde_json::to_string_pretty(&dag)?),
    }

    Ok(())
}

fn print_dag(dag: &Dag) -> Result<(), Box<dyn std::error::Error>> {
    println!("ID: {}", dag.id());
    if let Some(description) = dag.description() {
        println!("  Description: {}", description);
    }
    println!("  Start date: {}", dag.start_date().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Schedule: {} ({})", dag.schedule(), dag.schedule().describe());
    println!("  Catchup: {}", dag.catchup());
    println!("  Tasks: {}", dag.len());

    for task_id in dag.topological_sort()? {
        let command = dag.task(&task_id).map(|t| t.command()).unwrap_or_default();
        let upstream = dag.upstream_of(&task_id);
        let deps: Vec<&str> = upstream.iter().map(|d| d.as_str()).collect();
        if deps.is_empty() {
            println!("    - {}: {}", task_id, command);
        } else {
            println!(
                "    - {}: {} (depends on: {})",
                task_id,
                command,
                deps.join(", ")
            );
        }
    }

    Ok(())
}
