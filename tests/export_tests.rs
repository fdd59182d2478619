// Retrospective report persistence: run a match, write JSON, read it back

mod common;

use serde_json::Value;
use tempfile::TempDir;
use trading_arena::{TradeAction, TradeProposal};

use common::{catalog_match, fast_config, scripted_participant};

#[tokio::test(start_paused = true)]
async fn test_report_written_to_disk_is_complete() {
    let rounds = vec![vec![TradeProposal::new(
        TradeAction::Long,
        "NVTX",
        5,
        "headline looked strong",
    )]];
    let mut scheduler = catalog_match(
        fast_config(2, 60),
        vec![
            scripted_participant("alice", rounds),
            scripted_participant("bob", vec![]),
        ],
    );
    let report = scheduler.run().await.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("match.json");
    report.write_to_file(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(parsed["standings"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["events"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["decisions"].as_array().unwrap().len(), 1);

    let decision = &parsed["decisions"][0];
    assert_eq!(decision["participant_id"], "alice");
    assert_eq!(decision["ticker"], "NVTX");
    assert!(decision["exit_price"].is_number());
    assert!(decision["favorable"].is_boolean());

    let event = &parsed["events"][0];
    assert!(event["headline"].as_str().unwrap().len() > 0);
    assert!(event["scheduled_display_secs"].is_number());
}

#[tokio::test(start_paused = true)]
async fn test_write_to_unwritable_path_reports_export_error() {
    let mut scheduler = catalog_match(
        fast_config(1, 30),
        vec![scripted_participant("alice", vec![])],
    );
    let report = scheduler.run().await.unwrap();

    let err = report
        .write_to_file("/nonexistent-dir/match.json")
        .unwrap_err();
    assert_eq!(err.category(), "export");
}
