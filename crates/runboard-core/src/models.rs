//! Data models for runboard, shaped like the dashboard's REST payloads.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::RunboardError;

/// Artifact path (e.g. `/sqlite/train`) to size in bytes.
///
/// Insertion-ordered so that tree placement follows the order paths were first seen.
pub type ArtifactMap = IndexMap<String, u64>;

/// State of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Incomplete,
    Running,
    Completed,
    Failed,
    Uncacheable,
}

impl StepStatus {
    /// Every status, in the order the dashboard offers them as filter options.
    pub const ALL: [StepStatus; 5] = [
        StepStatus::Incomplete,
        StepStatus::Running,
        StepStatus::Completed,
        StepStatus::Failed,
        StepStatus::Uncacheable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Incomplete => "incomplete",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Uncacheable => "uncacheable",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = RunboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        StepStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| RunboardError::UnknownStatus(s.to_string()))
    }
}

/// Aggregated state of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The run hasn't started or was stopped early.
    Incomplete,
    /// Some steps are still running.
    Running,
    /// All cacheable steps completed successfully.
    Completed,
    /// At least one step failed.
    Failed,
    /// All steps are uncacheable, so there is no status.
    Uncacheable,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Incomplete => write!(f, "incomplete"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Uncacheable => write!(f, "uncacheable"),
        }
    }
}

/// A step as reported by the workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepInfo {
    pub id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<DateTime<Utc>>,
    /// Location of the step's results, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    /// Ids of upstream steps.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl StepInfo {
    pub fn new(id: impl Into<String>, status: StepStatus) -> Self {
        Self {
            id: id.into(),
            status,
            started: None,
            ended: None,
            results: None,
            dependencies: vec![],
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// A step within a run: carries its step name and 1-based execution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStepInfo {
    #[serde(flatten)]
    pub info: StepInfo,
    pub name: String,
    pub order: usize,
}

/// Row of the workspace runs table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub name: String,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
}

/// A run with its steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub name: String,
    pub status: RunStatus,
    /// Aggregated step status written by the backend, e.g. "2 running, 1 failed".
    #[serde(default)]
    pub step_status: String,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_step_infos: Vec<RunStepInfo>,
}

impl Run {
    pub fn step(&self, id: &str) -> Option<&RunStepInfo> {
        self.run_step_infos.iter().find(|s| s.info.id == id)
    }
}
