use anyhow::Context;
use gtm_audit::error::AuditError;
use std::time::Duration;

#[test]
fn timeout_survives_anyhow_context() {
    let inner: anyhow::Result<()> = Err(AuditError::Timeout {
        url: "https://a.com".into(),
        stage: "running lighthouse".into(),
        after: Duration::from_secs(30),
    }
    .into());
    let err = inner.context("round 2").unwrap_err();
    let recovered = AuditError::from_anyhow("https://a.com", err);
    assert!(matches!(recovered, AuditError::Timeout { .. }));
    assert_eq!(recovered.http_status(), 500);
}

#[test]
fn plain_errors_become_measurement() {
    let err = anyhow::anyhow!("connection refused");
    match AuditError::from_anyhow("https://a.com", err) {
        AuditError::Measurement { message, .. } => assert!(message.contains("refused")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn invalid_url_maps_to_400() {
    let err = AuditError::InvalidUrl {
        input: "nope".into(),
        reason: "relative URL without a base".into(),
    };
    assert_eq!(err.http_status(), 400);
}
