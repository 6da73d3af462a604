//! Step ordering and run status aggregation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::models::{Run, RunStatus, RunStepInfo, StepInfo, StepStatus};

/// Order items so every step comes after its dependencies.
///
/// Works in passes over the remaining items, emitting each one whose
/// dependencies were all emitted already (including earlier in the same
/// pass). A pass that emits nothing means a cycle or a dependency on an
/// unknown step; the rest is then emitted in input order.
pub fn ordered_by_dependencies<T, F>(items: &[T], info: F) -> Vec<&T>
where
    F: Fn(&T) -> &StepInfo,
{
    let mut done: HashSet<&str> = HashSet::with_capacity(items.len());
    let mut ordered = Vec::with_capacity(items.len());
    let mut todo: Vec<&T> = items.iter().collect();

    while !todo.is_empty() {
        let before = todo.len();
        let mut next = Vec::new();
        for item in todo {
            let step = info(item);
            if step.dependencies.iter().all(|d| done.contains(d.as_str())) {
                done.insert(step.id.as_str());
                ordered.push(item);
            } else {
                next.push(item);
            }
        }
        if next.len() == before {
            warn!(
                remaining = next.len(),
                "Steps with unresolvable dependencies, keeping input order"
            );
            ordered.extend(next);
            break;
        }
        todo = next;
    }

    ordered
}

pub fn ordered_steps(steps: &[StepInfo]) -> Vec<&StepInfo> {
    ordered_by_dependencies(steps, |s| s)
}

/// Pair steps with their names and number them 1.. in dependency order.
pub fn number_steps(steps: &[(String, StepInfo)]) -> Vec<RunStepInfo> {
    ordered_by_dependencies(steps, |(_, info)| info)
        .into_iter()
        .enumerate()
        .map(|(i, (name, info))| RunStepInfo {
            info: info.clone(),
            name: name.clone(),
            order: i + 1,
        })
        .collect()
}

/// Step counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub incomplete: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub uncacheable: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: StepStatus) {
        match status {
            StepStatus::Incomplete => self.incomplete += 1,
            StepStatus::Running => self.running += 1,
            StepStatus::Completed => self.completed += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Uncacheable => self.uncacheable += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.incomplete + self.running + self.completed + self.failed + self.uncacheable
    }
}

/// What a run's steps say about the run as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunProgress {
    pub status: RunStatus,
    /// e.g. "2 running, 1 failed, 5 completed"
    pub step_status: String,
    /// Latest step end, unless something is still running or incomplete.
    pub ended: Option<DateTime<Utc>>,
    pub counts: StatusCounts,
}

impl RunProgress {
    pub fn from_steps<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = &'a StepInfo>,
    {
        let mut counts = StatusCounts::default();
        let mut ended: Option<DateTime<Utc>> = None;
        for step in steps {
            counts.add(step.status);
            if let Some(end) = step.ended {
                ended = Some(ended.map_or(end, |e| e.max(end)));
            }
        }

        let step_status = [
            (counts.running, "running"),
            (counts.failed, "failed"),
            (counts.completed, "completed"),
            (counts.incomplete, "incomplete"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{} {}", n, label))
        .collect::<Vec<_>>()
        .join(", ");

        let status = if counts.failed > 0 {
            RunStatus::Failed
        } else if counts.running > 0 {
            RunStatus::Running
        } else if counts.incomplete > 0 {
            RunStatus::Incomplete
        } else if counts.completed > 0 {
            RunStatus::Completed
        } else if counts.uncacheable > 0 {
            RunStatus::Uncacheable
        } else {
            RunStatus::Completed
        };

        if counts.incomplete > 0 || counts.running > 0 {
            ended = None;
        }

        Self {
            status,
            step_status,
            ended,
            counts,
        }
    }

    pub fn of_run(run: &Run) -> Self {
        Self::from_steps(run.run_step_infos.iter().map(|s| &s.info))
    }
}

/// Assemble a run from named steps: numbered in dependency order, with status
/// and end time derived from the steps.
pub fn assemble_run(
    name: impl Into<String>,
    started: Option<DateTime<Utc>>,
    steps: &[(String, StepInfo)],
) -> Run {
    let progress = RunProgress::from_steps(steps.iter().map(|(_, info)| info));
    Run {
        name: name.into(),
        status: progress.status,
        step_status: progress.step_status,
        started,
        ended: progress.ended,
        run_step_infos: number_steps(steps),
    }
}
