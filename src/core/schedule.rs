//! Schedule expression parsing and well-formedness checks.
//!
//! Supports the preset shortcuts (`@daily`, `@hourly`, `@once`, ...), interval
//! expressions (`@every 1h30m`), standard 5-field and extended 6-field cron
//! expressions, and the manual schedule (`None`). A schedule is only parsed and
//! described here; working out when it fires is the orchestrator's job.

use cron::Schedule as CronSchedule;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// Expression text of the manual (unscheduled) schedule.
pub const MANUAL_EXPRESSION: &str = "None";

/// Errors that can occur when parsing schedules.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval expression.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// Unknown `@` shortcut.
    #[error("unknown schedule shortcut: {0}")]
    UnknownShortcut(String),
}

/// A parsed schedule expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// The original expression string.
    expression: String,
    /// Parsed schedule type.
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    /// Only triggered by hand.
    Manual,
    /// Runs a single time.
    Once,
    /// Starts a new run as soon as the previous one finishes.
    Continuous,
    /// A cron schedule, with its nominal period when it has a fixed one.
    Cron { period: Option<Duration> },
    /// Interval-based schedule (e.g., @every 5m).
    Interval(Duration),
}

impl Schedule {
    /// Parse a schedule expression.
    ///
    /// Supports:
    /// - Presets: `@once`, `@continuous`, `@hourly`, `@daily`, `@midnight`,
    ///   `@weekly`, `@monthly`, `@quarterly`, `@yearly`, `@annually`
    /// - Intervals: `@every 5m`, `@every 1h30m`
    /// - Standard 5-field cron: `minute hour day month weekday`
    /// - Extended 6-field cron: `second minute hour day month weekday`
    /// - `None` for a manual-only schedule
    pub fn new(expression: impl Into<String>) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let kind = Self::parse_expression(&expression)?;
        Ok(Self { expression, kind })
    }

    /// A schedule that never fires on its own.
    pub fn manual() -> Self {
        Self {
            expression: MANUAL_EXPRESSION.to_string(),
            kind: ScheduleKind::Manual,
        }
    }

    /// A fixed-interval schedule, rendered as an `@every` expression.
    pub fn every(interval: Duration) -> Result<Self, ScheduleError> {
        let secs = interval.as_secs();
        if secs == 0 {
            return Err(ScheduleError::InvalidInterval(format!("{:?}", interval)));
        }

        let mut text = String::new();
        let mut rest = secs;
        for (unit, size) in [('d', DAY), ('h', HOUR), ('m', 60), ('s', 1)] {
            if rest >= size {
                text.push_str(&format!("{}{}", rest / size, unit));
                rest %= size;
            }
        }

        Ok(Self {
            expression: format!("@every {}", text),
            kind: ScheduleKind::Interval(Duration::from_secs(secs)),
        })
    }

    /// Parse the expression into a schedule type.
    fn parse_expression(expression: &str) -> Result<ScheduleKind, ScheduleError> {
        let trimmed = expression.trim();

        if trimmed.eq_ignore_ascii_case(MANUAL_EXPRESSION) {
            return Ok(ScheduleKind::Manual);
        }

        if trimmed.starts_with('@') {
            return Self::parse_shortcut(trimmed);
        }

        Self::parse_cron(trimmed, None)
    }

    /// Parse a shortcut expression (@daily, @every, etc.).
    fn parse_shortcut(expression: &str) -> Result<ScheduleKind, ScheduleError> {
        let lower = expression.to_lowercase();
        match lower.as_str() {
            "@once" => Ok(ScheduleKind::Once),
            "@continuous" => Ok(ScheduleKind::Continuous),
            "@hourly" => Self::parse_cron("0 * * * *", Some(Duration::from_secs(HOUR))),
            "@daily" | "@midnight" => Self::parse_cron("0 0 * * *", Some(Duration::from_secs(DAY))),
            "@weekly" => Self::parse_cron("0 0 * * SUN", Some(Duration::from_secs(7 * DAY))),
            "@monthly" => Self::parse_cron("0 0 1 * *", None),
            "@quarterly" => Self::parse_cron("0 0 1 1/3 *", None),
            "@yearly" | "@annually" => Self::parse_cron("0 0 1 1 *", None),
            s if s.starts_with("@every ") => {
                let duration = Self::parse_duration(s["@every ".len()..].trim())?;
                Ok(ScheduleKind::Interval(duration))
            }
            _ => Err(ScheduleError::UnknownShortcut(expression.to_string())),
        }
    }

    /// Parse a duration string like "5m", "1h", "1h30m", "30s".
    fn parse_duration(s: &str) -> Result<Duration, ScheduleError> {
        let mut total_secs: u64 = 0;
        let mut current_num = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
                continue;
            }

            let num: u64 = current_num
                .parse()
                .map_err(|_| ScheduleError::InvalidInterval(s.to_string()))?;
            current_num.clear();

            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => HOUR,
                'd' => DAY,
                _ => return Err(ScheduleError::InvalidInterval(s.to_string())),
            };
            total_secs = num
                .checked_mul(unit)
                .and_then(|secs| total_secs.checked_add(secs))
                .ok_or_else(|| ScheduleError::InvalidInterval(s.to_string()))?;
        }

        // A trailing number without a unit
        if !current_num.is_empty() || total_secs == 0 {
            return Err(ScheduleError::InvalidInterval(s.to_string()));
        }

        Ok(Duration::from_secs(total_secs))
    }

    /// Parse a cron expression. Without an explicit `period`, one is inferred
    /// for fixed-stride lines.
    fn parse_cron(expression: &str, period: Option<Duration>) -> Result<ScheduleKind, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();

        let cron_expr = match fields.len() {
            // Standard 5-field cron, add seconds field
            5 => format!("0 {}", fields.join(" ")),
            6 => fields.join(" "),
            n => {
                return Err(ScheduleError::InvalidCron(format!(
                    "expected 5 or 6 fields, got {}",
                    n
                )));
            }
        };

        CronSchedule::from_str(&cron_expr)
            .map_err(|e| ScheduleError::InvalidCron(format!("{}: {}", expression, e)))?;

        let period = period.or_else(|| Self::fixed_period(&cron_expr));
        Ok(ScheduleKind::Cron { period })
    }

    /// Period of a 6-field cron line that fires once per hour or once per
    /// day: fixed second and minute, a fixed or `*` hour, and `*` for day,
    /// month and weekday.
    fn fixed_period(cron_expr: &str) -> Option<Duration> {
        let fields: Vec<&str> = cron_expr.split_whitespace().collect();
        let [second, minute, hour, day, month, weekday] = *fields.as_slice() else {
            return None;
        };

        let fixed = |field: &str| field.parse::<u32>().is_ok();
        let any = |field: &str| field == "*";
        if !(fixed(second) && fixed(minute) && any(day) && any(month) && any(weekday)) {
            return None;
        }

        if fixed(hour) {
            Some(Duration::from_secs(DAY))
        } else if any(hour) {
            Some(Duration::from_secs(HOUR))
        } else {
            None
        }
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule only runs when triggered by hand.
    pub fn is_manual(&self) -> bool {
        matches!(self.kind, ScheduleKind::Manual)
    }

    /// Nominal time between two runs, for schedules with a fixed period.
    ///
    /// Calendar schedules (`@monthly`, `@yearly`) and cron lines that do
    /// not fire exactly once per hour or per day return `None`.
    pub fn period(&self) -> Option<Duration> {
        match &self.kind {
            ScheduleKind::Cron { period, .. } => *period,
            ScheduleKind::Interval(duration) => Some(*duration),
            ScheduleKind::Manual | ScheduleKind::Once | ScheduleKind::Continuous => None,
        }
    }

    /// Whether the schedule recurs once a day.
    pub fn is_daily(&self) -> bool {
        self.period() == Some(Duration::from_secs(DAY))
    }

    /// Short description of the schedule type.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ScheduleKind::Manual => "manual",
            ScheduleKind::Once => "once",
            ScheduleKind::Continuous => "continuous",
            ScheduleKind::Cron { .. } => "cron",
            ScheduleKind::Interval(_) => "interval",
        }
    }
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for Schedule {}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// Schedules travel as their expression text and are re-parsed on load.
impl Serialize for Schedule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.expression)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let expression = String::deserialize(deserializer)?;
        Schedule::new(expression).map_err(serde::de::Error::custom)
    }
}
