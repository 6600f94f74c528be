use std::fs;
use std::process::Command;

use codefight_app::{MatchPlan, PlanError, PlanOverrides};
use codefight_core::{AiStatus, StopEvent};

const SHORT_LIVED: &str = r#"{
    "config": {"memory_size": 8, "max_players": 2},
    "ais": [
        {"name": "a", "program": "JMP,1,0"},
        {"name": "b", "program": "JMP,1,0"}
    ],
    "lineup": ["a", "b"],
    "steps": 1000
}"#;

#[test]
fn plan_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plan.json");
    fs::write(&path, SHORT_LIVED).expect("write plan");

    let plan = MatchPlan::load(&path).expect("load");
    let report = plan.run().expect("run");
    assert_eq!(
        report.stops,
        vec![
            StopEvent { name: "a".into(), steps: 1 },
            StopEvent { name: "b".into(), steps: 1 },
        ]
    );
    assert!(report.ais.iter().all(|ai| ai.status == AiStatus::Stopped));
    assert_eq!(report.survivors().count(), 0);
}

#[test]
fn missing_plan_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = MatchPlan::load(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(err, PlanError::Io { .. }));
}

#[test]
fn overridden_memory_size_is_validated() {
    let plan = MatchPlan::from_json(SHORT_LIVED)
        .expect("plan")
        .with_overrides(PlanOverrides {
            memory_size: Some(3),
            ..PlanOverrides::default()
        });
    let err = plan.run().expect_err("arena too small");
    assert!(err.to_string().starts_with("invalid argument"));
}

#[test]
fn binary_prints_stop_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plan.json");
    fs::write(&path, SHORT_LIVED).expect("write plan");

    let output = Command::new(env!("CARGO_BIN_EXE_codefight"))
        .env("CODEFIGHT_PLAN", &path)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run codefight binary");
    assert!(output.status.success(), "codefight run failed");
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(
        stdout,
        "a executed 1 steps until stopping.\nb executed 1 steps until stopping.\n"
    );
}

#[test]
fn binary_rejects_malformed_plan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plan.json");
    fs::write(&path, "{\"ais\": 3}").expect("write plan");

    let output = Command::new(env!("CARGO_BIN_EXE_codefight"))
        .arg("--plan")
        .arg(&path)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run codefight binary");
    assert!(!output.status.success());
}
