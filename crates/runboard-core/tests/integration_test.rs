//! Integration tests for runboard-core: snapshots on disk through to layout.

use runboard_core::storage;
use runboard_core::{
    build_path_tree, Direction, LayoutConfig, RunStatus, RunboardError, StepFlow, StepStatus,
};
use tempfile::TempDir;

const RUN_JSON: &str = r#"{
    "name": "name 1",
    "status": "running",
    "stepStatus": "1 running, 2 completed",
    "started": "2022-10-20T19:45:00Z",
    "runStepInfos": [
        {
            "id": "Preparing-002rep",
            "name": "prepare",
            "order": 1,
            "status": "completed",
            "started": "2022-10-20T19:45:00Z",
            "ended": "2022-10-20T19:59:00Z",
            "dependencies": []
        },
        {
            "id": "Pretraining-002rep",
            "name": "pretrain",
            "order": 2,
            "status": "completed",
            "dependencies": ["Preparing-002rep"]
        },
        {
            "id": "Finetune-002rep",
            "name": "finetune",
            "order": 3,
            "status": "running",
            "results": "s3://bucket/finetune",
            "dependencies": ["Preparing-002rep", "Pretraining-002rep"]
        }
    ]
}"#;

fn write(tmp: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = tmp.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_run_snapshot() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "run.json", RUN_JSON);

    let run = storage::load_run(&path).unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.run_step_infos.len(), 3);
    let finetune = run.step("Finetune-002rep").unwrap();
    assert_eq!(finetune.info.status, StepStatus::Running);
    assert_eq!(finetune.info.results.as_deref(), Some("s3://bucket/finetune"));
    assert_eq!(finetune.info.dependencies.len(), 2);
}

#[test]
fn test_run_snapshot_to_layout() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "run.json", RUN_JSON);
    let run = storage::load_run(&path).unwrap();

    let flow = StepFlow::from_run_steps(&run.run_step_infos, Direction::LeftToRight, LayoutConfig::default());
    let graph = flow.graph();
    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.edges.len(), 3);
    let prepare = graph.node("Preparing-002rep").unwrap();
    let finetune = graph.node("Finetune-002rep").unwrap();
    assert!(prepare.position.x < finetune.position.x);
    assert_eq!(finetune.step.status, Some(StepStatus::Running));
}

#[test]
fn test_artifact_key_order_survives_json() {
    let tmp = TempDir::new().unwrap();
    let path = write(
        &tmp,
        "artifacts.json",
        r#"{"/sqlite/test.zip": 1650001, "/logs/pass1.txt": 165001, "/sqlite/val.zip": 987001}"#,
    );
    let artifacts = storage::load_artifacts(&path).unwrap();
    let roots = build_path_tree(&artifacts);
    let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["sqlite", "logs"]);
}

#[test]
fn test_missing_snapshot_is_reported() {
    let tmp = TempDir::new().unwrap();
    let err = storage::load_run(&tmp.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, RunboardError::SnapshotNotFound(_)));
}

#[test]
fn test_malformed_snapshot_is_json_error() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "runs.json", "[{\"name\": 3}]");
    let err = storage::load_runs(&path).unwrap_err();
    assert!(matches!(err, RunboardError::Json(_)));
}

#[test]
fn test_layout_config_defaults_when_missing() {
    let tmp = TempDir::new().unwrap();
    let config = LayoutConfig::load(&tmp.path().join("layout.yaml")).unwrap();
    assert_eq!(config, LayoutConfig::default());
}

#[test]
fn test_layout_config_partial_yaml() {
    let tmp = TempDir::new().unwrap();
    let path = write(&tmp, "layout.yaml", "rank_sep: 120\nexpanded:\n  width: 400\n  height: 500\n");
    let config = LayoutConfig::load(&path).unwrap();
    assert_eq!(config.rank_sep, 120.0);
    assert_eq!(config.expanded.height, 500.0);
    assert_eq!(config.node_sep, LayoutConfig::default().node_sep);
}

#[test]
fn test_layout_config_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("layout.yaml");
    let mut config = LayoutConfig::default();
    config.order_iterations = 8;
    config.save(&path).unwrap();
    assert_eq!(LayoutConfig::load(&path).unwrap(), config);
}

#[test]
fn test_steps_snapshot() {
    let tmp = TempDir::new().unwrap();
    let path = write(
        &tmp,
        "steps.json",
        r#"[{"id": "a", "status": "failed"}, {"id": "b", "status": "uncacheable", "dependencies": ["a"]}]"#,
    );
    let steps = storage::load_steps(&path).unwrap();
    assert_eq!(steps[0].status, StepStatus::Failed);
    assert!(steps[0].dependencies.is_empty());
    assert_eq!(steps[1].dependencies, ["a"]);
}

#[test]
fn test_step_status_from_str() {
    assert_eq!("Failed".parse::<StepStatus>().unwrap(), StepStatus::Failed);
    assert_eq!("uncacheable".parse::<StepStatus>().unwrap(), StepStatus::Uncacheable);
    let err = "done".parse::<StepStatus>().unwrap_err();
    assert!(matches!(err, RunboardError::UnknownStatus(s) if s == "done"));
}
