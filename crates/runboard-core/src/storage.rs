//! Snapshot and config I/O: JSON payloads saved from the workspace API, YAML settings.

use std::fs;
use std::path::Path;

use crate::error::{Result, RunboardError};
use crate::models::{ArtifactMap, Run, RunSummary, StepInfo};

// ─── YAML config I/O ─────────────────────────────────────────────────────────

pub fn save_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_yaml::to_string(data)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T>
where
    T: Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    let val = serde_yaml::from_str(&content)?;
    Ok(val)
}

// ─── JSON snapshots ──────────────────────────────────────────────────────────

pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(RunboardError::SnapshotNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data)?;
    fs::write(path, content)?;
    Ok(())
}

/// A run as returned by `GET /api/workspace/{wsid}/run/{rid}`.
pub fn load_run(path: &Path) -> Result<Run> {
    load_json(path)
}

/// Runs listed for a workspace.
pub fn load_runs(path: &Path) -> Result<Vec<RunSummary>> {
    load_json(path)
}

/// Steps listed for a workspace.
pub fn load_steps(path: &Path) -> Result<Vec<StepInfo>> {
    load_json(path)
}

/// A step's artifact map (`{"/sqlite/train": 16440001, ...}`), key order preserved.
pub fn load_artifacts(path: &Path) -> Result<ArtifactMap> {
    load_json(path)
}
