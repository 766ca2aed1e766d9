//! Task and job graph types

use crate::job::UnitType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Role of a task within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// Runs once on each node before any sweep instance
    NodePrep,
    /// Runs once per frame value
    Sweep,
    /// Runs once on each node after the job, even if the sweep failed
    NodeRelease,
}

impl TaskKind {
    /// Scheduler task type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodePrep => "NodePrep",
            Self::Sweep => "ParametricSweep",
            Self::NodeRelease => "NodeRelease",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed core allocation for one sweep instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreBounds {
    /// Minimum cores
    pub min_cores: u32,
    /// Maximum cores
    pub max_cores: u32,
}

/// Inclusive parametric range, `start <= end`, `step >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRange {
    /// First value
    pub start: i64,
    /// Last value
    pub end: i64,
    /// Increment
    pub step: u32,
}

impl SweepRange {
    /// Number of sweep instances, saturating at `u64::MAX`
    pub fn instances(&self) -> u64 {
        (self.end.abs_diff(self.start) / u64::from(self.step.max(1))).saturating_add(1)
    }
}

/// Output redirection for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRedirect {
    /// Standard output file
    pub stdout: String,
    /// Standard error file
    pub stderr: String,
}

/// When a dependent task may start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    /// After the predecessor succeeded
    OnSuccess,
    /// After the predecessor finished, whatever its outcome
    Always,
}

/// Ordering edge to a predecessor task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Predecessor
    pub after: TaskKind,
    /// Start condition
    pub trigger: Trigger,
}

/// One schedulable unit of work, fully resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Display name
    pub name: String,
    /// Role
    pub kind: TaskKind,
    /// Shell command
    pub command_line: String,
    /// Environment variables
    pub environment: BTreeMap<String, String>,
    /// Core bounds, sweep on core-granularity jobs only
    pub resource_bounds: Option<CoreBounds>,
    /// Frame range, sweep only
    pub sweep_range: Option<SweepRange>,
    /// Log redirection
    pub io_redirect: Option<IoRedirect>,
    /// Predecessor
    pub dependency: Option<Dependency>,
}

/// Complete job ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobGraph {
    /// Display name
    pub name: String,
    /// Job id
    pub uuid: String,
    /// Scheduling granularity
    pub unit_type: UnitType,
    /// No other job shares the nodes
    pub exclusive: bool,
    /// NodePrep, Sweep, NodeRelease in that order
    pub tasks: [Task; 3],
}

impl JobGraph {
    /// Task of the given kind
    pub fn task(&self, kind: TaskKind) -> &Task {
        match kind {
            TaskKind::NodePrep => &self.tasks[0],
            TaskKind::Sweep => &self.tasks[1],
            TaskKind::NodeRelease => &self.tasks[2],
        }
    }

    /// The render sweep
    pub fn sweep(&self) -> &Task {
        self.task(TaskKind::Sweep)
    }

    /// Log a readable summary at debug level
    pub fn log_summary(&self) {
        tracing::debug!(
            "Job '{}' ({}), unit type {}, exclusive {}",
            self.name,
            self.uuid,
            self.unit_type,
            self.exclusive
        );
        for task in &self.tasks {
            tracing::debug!("  [{}] {}: {}", task.kind, task.name, task.command_line);
            if let Some(range) = task.sweep_range {
                tracing::debug!(
                    "    frames {}-{} step {} ({} instances)",
                    range.start,
                    range.end,
                    range.step,
                    range.instances()
                );
            }
            if let Some(bounds) = task.resource_bounds {
                tracing::debug!("    cores {}-{}", bounds.min_cores, bounds.max_cores);
            }
            for (key, value) in &task.environment {
                tracing::debug!("    {}={}", key, value);
            }
        }
    }
}
