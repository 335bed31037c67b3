//! Airflow DAG files.
//!
//! Two readers live here. [`extract`] is the quick line scanner used while
//! walking a workspace: it only needs operator variables and `>>` chains to
//! draw a graph. [`parse_dag`] reads a whole DAG file into a validated
//! [`Dag`], including its metadata and every task's shell command.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use tracing::debug;

use super::python::{
    self, Arg, Shift, Value, blank_comments, blank_strings, call_body, kwarg, line_at,
    logical_lines, parse_args, positional, split_shift_chain,
};
use super::{PipelineGraph, ScanError, SourceLocation, node_id};
use crate::config::YamlLoader;
use crate::core::dag::{Dag, DagError};
use crate::core::schedule::Schedule;
use crate::core::task::TaskHandle;

/// `name = SomethingOperator(` on one line.
static OPERATOR_ASSIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s*=\s*\w*Operator\(").unwrap());

/// First identifier in a chain segment.
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Multi-line variant used by the full reader; captures the operator path.
static OPERATOR_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*([A-Za-z_]\w*)[ \t]*=[ \t]*((?:[A-Za-z_]\w*\.)*\w*Operator)[ \t]*\(")
        .unwrap()
});

/// The `DAG(` call, bare or module-qualified.
static DAG_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bDAG[ \t]*\(").unwrap());

/// `a.set_downstream(...)` / `a.set_upstream(...)`.
static SET_STREAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\.set_(downstream|upstream)\((.*)\)$").unwrap()
});

/// `target = rest`; a `==` comparison leaves `rest` starting with `=`.
static ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w.]*)\s*=(.*)$").unwrap());

/// `chain(a, b, c)`.
static CHAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\w+\.)*chain\((.*)\)$").unwrap());

/// Add operator variables and `>>` chains found in `content` to the graph.
pub fn extract(content: &str, file: &str, graph: &mut PipelineGraph) {
    let mut vars: HashMap<String, String> = HashMap::new();

    for (i, line) in content.lines().enumerate() {
        if let Some(caps) = OPERATOR_ASSIGN_RE.captures(line) {
            let name = &caps[1];
            let id = node_id(file, name);
            graph.define(
                &id,
                name,
                SourceLocation {
                    file: file.to_string(),
                    line: i + 1,
                },
            );
            vars.insert(name.to_string(), id);
        }

        if line.contains(">>") {
            let parts: Vec<&str> = line.split(">>").map(str::trim).collect();
            for pair in parts.windows(2) {
                let (Some(a), Some(b)) = (first_identifier(pair[0]), first_identifier(pair[1]))
                else {
                    continue;
                };
                let id_a = vars.get(a).cloned().unwrap_or_else(|| node_id(file, a));
                let id_b = vars.get(b).cloned().unwrap_or_else(|| node_id(file, b));
                graph.add_node(&id_a, a);
                graph.add_node(&id_b, b);
                graph.add_edge(&id_a, &id_b);
            }
        }
    }
}

fn first_identifier(segment: &str) -> Option<&str> {
    IDENT_RE.find(segment).map(|m| m.as_str())
}

/// Read an Airflow DAG file from disk into a [`Dag`].
pub fn parse_dag_file(path: impl AsRef<Path>) -> Result<Dag, ScanError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dag(&source)
}

/// Read the source of an Airflow DAG file into a validated [`Dag`].
///
/// Understands the `DAG(...)` call (as a `with` block or an assignment),
/// `BashOperator` tasks, and dependencies declared with `>>`, `<<`, lists,
/// `set_downstream`/`set_upstream` and `chain(...)`. Statements may span
/// lines through brackets or a trailing `\`.
pub fn parse_dag(source: &str) -> Result<Dag, ScanError> {
    // Both views keep the byte offsets of `source`; `code` also hides string
    // literals so patterns only match real code.
    let clean = blank_comments(source);
    let code = blank_strings(&clean);

    let dag_match = DAG_CALL_RE.find(&code).ok_or(ScanError::NoDagDeclaration)?;
    let open = dag_match.end() - 1;
    let dag_line = line_at(&clean, open);
    let (body, _) = call_body(&clean, open)?;
    let mut dag = build_dag(&parse_args(body), dag_line)?;

    let mut vars: HashMap<String, TaskHandle> = HashMap::new();
    for caps in OPERATOR_DECL_RE.captures_iter(&code) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        let var = caps[1].to_string();
        let operator = caps[2].to_string();
        let line = line_at(&clean, whole.0);

        if operator.rsplit('.').next() != Some("BashOperator") {
            return Err(ScanError::UnsupportedOperator {
                var,
                operator,
                line,
            });
        }

        let (body, _) = call_body(&clean, whole.1 - 1)?;
        let args = parse_args(body);
        let task_id = string_arg(&args, "task_id", "BashOperator", line)?;
        let command = string_arg(&args, "bash_command", "BashOperator", line)?;

        let handle = dag.bash_task(task_id, command)?;
        debug!(var = %var, task = %handle.id(), line, "read BashOperator");
        vars.insert(var, handle);
    }

    for (line, statement) in logical_lines(&code) {
        apply_dependencies(&mut dag, &vars, &statement, line)?;
    }

    dag.validate()?;
    Ok(dag)
}

fn build_dag(args: &[Arg], line: usize) -> Result<Dag, ScanError> {
    let dag_id = match kwarg(args, "dag_id").or_else(|| positional(args, 0)) {
        Some(Value::Str(id)) => id.clone(),
        Some(other) => return Err(invalid("dag_id", other, line)),
        None => return Err(missing("DAG", "dag_id", line)),
    };

    let start_date = match kwarg(args, "start_date") {
        Some(value) => start_date(value, line)?,
        None => return Err(missing("DAG", "start_date", line)),
    };

    let schedule_arg = kwarg(args, "schedule").or_else(|| kwarg(args, "schedule_interval"));
    let schedule = match schedule_arg {
        None => Schedule::new("@daily")?,
        Some(Value::None) => Schedule::manual(),
        Some(Value::Str(expr)) => Schedule::new(expr.as_str())?,
        Some(Value::Call { name, args }) if name.ends_with("timedelta") => match timedelta(args) {
            Some(period) => Schedule::every(period)?,
            None => return Err(invalid_text("schedule", format!("{}(...)", name), line)),
        },
        Some(other) => return Err(invalid("schedule", other, line)),
    };

    let catchup = match kwarg(args, "catchup") {
        None => false,
        Some(Value::Bool(flag)) => *flag,
        Some(other) => return Err(invalid("catchup", other, line)),
    };

    let mut dag = Dag::new(dag_id, start_date, schedule, catchup)?;
    match kwarg(args, "description") {
        None | Some(Value::None) => {}
        Some(Value::Str(text)) => dag = dag.with_description(text.as_str()),
        Some(other) => return Err(invalid("description", other, line)),
    }

    Ok(dag)
}

/// `datetime(y, m, d[, H, M, S])`, `pendulum.datetime(...)` or an ISO string.
fn start_date(value: &Value, line: usize) -> Result<DateTime<Utc>, ScanError> {
    match value {
        Value::Call { name, args } if name.ends_with("datetime") => {
            let mut parts = [0i64; 6];
            for (slot, part) in parts.iter_mut().zip(args.iter().filter(|a| a.key.is_none())) {
                match part.value {
                    Value::Int(n) => *slot = n,
                    _ => return Err(invalid("start_date", value, line)),
                }
            }
            let [year, month, day, hour, minute, second] = parts;
            to_utc(year, month, day, hour, minute, second)
                .ok_or_else(|| ScanError::Dag(DagError::InvalidStartDate(value.describe())))
        }
        Value::Str(text) => YamlLoader::parse_start_date(text)
            .map_err(|_| ScanError::Dag(DagError::InvalidStartDate(text.clone()))),
        other => Err(invalid("start_date", other, line)),
    }
}

fn to_utc(
    year: i64,
    month: i64,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    let time = date.and_hms_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
    )?;
    Some(time.and_utc())
}

/// `timedelta(days=1, hours=2, ...)` as a duration.
fn timedelta(args: &[Arg]) -> Option<std::time::Duration> {
    let mut secs: u64 = 0;
    for arg in args {
        let Value::Int(n) = arg.value else {
            return None;
        };
        let n = u64::try_from(n).ok()?;
        let unit = match arg.key.as_deref()? {
            "weeks" => 7 * 86_400,
            "days" => 86_400,
            "hours" => 3_600,
            "minutes" => 60,
            "seconds" => 1,
            _ => return None,
        };
        secs = secs.checked_add(n.checked_mul(unit)?)?;
    }
    Some(std::time::Duration::from_secs(secs))
}

fn string_arg(args: &[Arg], name: &str, call: &str, line: usize) -> Result<String, ScanError> {
    match kwarg(args, name) {
        Some(Value::Str(text)) => Ok(text.clone()),
        Some(other) => Err(invalid(name, other, line)),
        None => Err(missing(call, name, line)),
    }
}

fn missing(call: &str, name: &str, line: usize) -> ScanError {
    ScanError::MissingArgument {
        call: call.to_string(),
        name: name.to_string(),
        line,
    }
}

fn invalid(name: &str, value: &Value, line: usize) -> ScanError {
    invalid_text(name, value.describe(), line)
}

fn invalid_text(name: &str, value: String, line: usize) -> ScanError {
    ScanError::InvalidArgument {
        name: name.to_string(),
        value,
        line,
    }
}

/// Apply the dependency statement, if `statement` is one. Statements that
/// are not dependency statements are ignored; dependency statements whose
/// operands are not task variables are an error.
fn apply_dependencies(
    dag: &mut Dag,
    vars: &HashMap<String, TaskHandle>,
    statement: &str,
    line: usize,
) -> Result<(), ScanError> {
    // `x = a >> b` still declares a >> b
    let expr = match ASSIGNMENT_RE.captures(statement) {
        Some(caps) if !caps[2].starts_with('=') => caps.get(2).map_or("", |m| m.as_str()),
        _ => statement,
    };
    let expr = python::unwrap_parens(expr);
    let unreadable = || ScanError::UnreadableDependency {
        statement: statement.to_string(),
        line,
    };

    if let Some(caps) = SET_STREAM_RE.captures(expr) {
        let task = resolve(vars, &caps[1], line)?;
        let others = operand_names(&caps[3]).ok_or_else(unreadable)?;
        for other in others {
            let other = resolve(vars, other, line)?;
            if &caps[2] == "downstream" {
                dag.set_downstream(&task, &other)?;
            } else {
                dag.set_upstream(&task, &other)?;
            }
        }
        return Ok(());
    }

    if let Some(caps) = CHAIN_RE.captures(expr) {
        let groups: Vec<Vec<&str>> = python::split_top_level(&caps[1], ',')
            .into_iter()
            .map(operand_names)
            .collect::<Option<_>>()
            .ok_or_else(unreadable)?;
        let shifts = vec![Shift::Downstream; groups.len().saturating_sub(1)];
        return link_groups(dag, vars, &groups, &shifts, line);
    }

    let (operands, shifts) = split_shift_chain(expr);
    if shifts.is_empty() {
        return Ok(());
    }
    let groups: Vec<Vec<&str>> = operands
        .into_iter()
        .map(operand_names)
        .collect::<Option<_>>()
        .ok_or_else(unreadable)?;
    link_groups(dag, vars, &groups, &shifts, line)
}

fn link_groups(
    dag: &mut Dag,
    vars: &HashMap<String, TaskHandle>,
    groups: &[Vec<&str>],
    shifts: &[Shift],
    line: usize,
) -> Result<(), ScanError> {
    for (pair, shift) in groups.windows(2).zip(shifts) {
        for left in &pair[0] {
            let left = resolve(vars, left, line)?;
            for right in &pair[1] {
                let right = resolve(vars, right, line)?;
                match shift {
                    Shift::Downstream => dag.set_downstream(&left, &right)?,
                    Shift::Upstream => dag.set_downstream(&right, &left)?,
                }
            }
        }
    }
    Ok(())
}

/// `name` or `[a, b]`; `None` when the operand is anything else.
fn operand_names(operand: &str) -> Option<Vec<&str>> {
    let operand = operand.trim();
    if python::is_identifier(operand) {
        return Some(vec![operand]);
    }
    let inner = operand.strip_prefix('[')?.strip_suffix(']')?;
    let names: Vec<&str> = python::split_top_level(inner, ',')
        .into_iter()
        .map(str::trim)
        .collect();
    names
        .iter()
        .all(|name| python::is_identifier(name))
        .then_some(names)
}

fn resolve(
    vars: &HashMap<String, TaskHandle>,
    name: &str,
    line: usize,
) -> Result<TaskHandle, ScanError> {
    vars.get(name).cloned().ok_or_else(|| ScanError::UnknownTask {
        var: name.to_string(),
        line,
    })
}
