mod common;

use common::{cpu_round, Round, ScriptedOracle};
use gtm_audit::{
    error::AuditError,
    stabilize::{stabilize, StabilizerSettings},
};
use std::time::Duration;

const URL: &str = "https://shop.example";

fn settings(run_count: u32, require_all_runs: bool) -> StabilizerSettings {
    StabilizerSettings {
        run_count,
        require_all_runs,
        url_timeout: None,
        dump_raw_reports: false,
    }
}

#[test]
fn averages_three_rounds() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-X", 100.0)]),
            cpu_round(&[("GTM-X", 200.0)]),
            cpu_round(&[("GTM-X", 300.0)]),
        ],
    );
    let metrics = stabilize(&oracle, &settings(3, true), URL).unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].container_id, "GTM-X");
    assert_eq!(metrics[0].total_cpu_time_ms, 200);
    assert_eq!(metrics[0].script_evaluation_ms, 100);
    assert_eq!(metrics[0].script_parse_time_ms, 20);
    assert_eq!(oracle.measured.borrow().len(), 3);
    assert_eq!(oracle.acquired.get(), 1);
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn container_missing_from_a_round_is_not_zero_filled() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-A", 100.0), ("GTM-B", 40.0)]),
            cpu_round(&[("GTM-A", 200.0)]),
            cpu_round(&[("GTM-A", 300.0), ("GTM-B", 60.0)]),
        ],
    );
    let metrics = stabilize(&oracle, &settings(3, true), URL).unwrap();
    let ids: Vec<&str> = metrics.iter().map(|m| m.container_id.as_str()).collect();
    assert_eq!(ids, vec!["GTM-A", "GTM-B"]);
    assert_eq!(metrics[1].total_cpu_time_ms, 50);
}

#[test]
fn mean_is_rounded_once_at_the_end() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-R", 100.25)]),
            cpu_round(&[("GTM-R", 100.25)]),
            cpu_round(&[("GTM-R", 101.0)]),
        ],
    );
    let metrics = stabilize(&oracle, &settings(3, true), URL).unwrap();
    // 301.5 / 3 = 100.5; rounding each round first would give 100
    assert_eq!(metrics[0].total_cpu_time_ms, 101);
}

#[test]
fn failing_round_releases_session_exactly_once() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-X", 100.0)]),
            Round::Fail("Protocol error: Target closed"),
            cpu_round(&[("GTM-X", 300.0)]),
        ],
    );
    let err = stabilize(&oracle, &settings(3, true), URL).unwrap_err();
    assert!(matches!(err, AuditError::Measurement { .. }));
    assert!(err.to_string().contains("Target closed"));
    assert_eq!(oracle.measured.borrow().len(), 2);
    assert_eq!(oracle.acquired.get(), 1);
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn round_without_gtm_aborts_by_default() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![cpu_round(&[("GTM-X", 100.0)]), cpu_round(&[])],
    );
    let err = stabilize(&oracle, &settings(3, true), URL).unwrap_err();
    assert!(matches!(err, AuditError::NoContainerFound { .. }));
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn tolerant_mode_averages_successful_rounds_only() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-X", 100.0)]),
            cpu_round(&[]),
            cpu_round(&[("GTM-X", 301.0)]),
        ],
    );
    let metrics = stabilize(&oracle, &settings(3, false), URL).unwrap();
    // (100 + 301) / 2 = 200.5, ties away from zero
    assert_eq!(metrics[0].total_cpu_time_ms, 201);
    assert_eq!(oracle.measured.borrow().len(), 3);
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn tolerant_mode_with_no_success_returns_last_error() {
    let oracle = ScriptedOracle::new().plan(URL, vec![Round::Fail("boom"), Round::Timeout]);
    let err = stabilize(&oracle, &settings(2, false), URL).unwrap_err();
    assert!(matches!(err, AuditError::Timeout { .. }));
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn timeout_keeps_its_own_message() {
    let oracle = ScriptedOracle::new().plan(URL, vec![Round::Timeout]);
    let err = stabilize(&oracle, &settings(3, true), URL).unwrap_err();
    assert!(matches!(err, AuditError::Timeout { .. }));
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn launch_failure_is_a_measurement_error_without_release() {
    let oracle = ScriptedOracle {
        fail_acquire: true,
        ..ScriptedOracle::new()
    };
    let err = stabilize(&oracle, &settings(3, true), URL).unwrap_err();
    match &err {
        AuditError::Measurement { message, .. } => {
            assert!(message.contains("browser launch failed"))
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(oracle.acquired.get(), 0);
    assert_eq!(oracle.released.get(), 0);
}

#[test]
fn url_deadline_is_a_timeout_and_releases_the_session() {
    let oracle = ScriptedOracle::new().plan(URL, vec![cpu_round(&[("GTM-X", 100.0)])]);
    let deadline = StabilizerSettings {
        url_timeout: Some(Duration::ZERO),
        ..settings(3, true)
    };
    let err = stabilize(&oracle, &deadline, URL).unwrap_err();
    assert!(matches!(err, AuditError::Timeout { .. }));
    assert!(err.to_string().contains("starting round 1/3"));
    assert!(oracle.measured.borrow().is_empty());
    assert_eq!(oracle.acquired.get(), 1);
    assert_eq!(oracle.released.get(), 1);
}

#[test]
fn repeated_container_in_one_round_counts_as_one_round() {
    let oracle = ScriptedOracle::new().plan(
        URL,
        vec![
            cpu_round(&[("GTM-D", 100.0), ("GTM-D", 200.0)]),
            cpu_round(&[("GTM-D", 450.0)]),
        ],
    );
    let metrics = stabilize(&oracle, &settings(2, true), URL).unwrap();
    assert_eq!(metrics.len(), 1);
    // round means 150 and 450; pooling all three entries would give 250
    assert_eq!(metrics[0].total_cpu_time_ms, 300);
}
