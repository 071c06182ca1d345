use crate::{
    config::Config,
    error::AuditError,
    model::AuditResult,
    oracle::Oracle,
    stabilize::{stabilize, StabilizerSettings},
};
use serde::Serialize;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// Snapshot handed to the progress callback. `current_url` is the URL about
/// to be audited, or `None` once the batch is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub current_url: Option<String>,
    pub eta: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedInput {
    pub input: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRun {
    pub results: Vec<AuditResult>,
    pub rejected: Vec<RejectedInput>,
    pub cancelled: bool,
}

pub struct Pipeline<O: Oracle> {
    settings: StabilizerSettings,
    oracle: O,
}

impl<O: Oracle> Pipeline<O> {
    pub fn new(cfg: &Config, oracle: O) -> Self {
        Self::with_settings(StabilizerSettings::from_config(cfg), oracle)
    }

    pub fn with_settings(settings: StabilizerSettings, oracle: O) -> Self {
        Self { settings, oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Audits one candidate URL. Malformed input fails before any
    /// measurement.
    pub fn audit_url(&self, input: &str) -> Result<AuditResult, AuditError> {
        let url = validate_url(input)?;
        Ok(self.audit_valid(&url))
    }

    fn audit_valid(&self, url: &str) -> AuditResult {
        match stabilize(&self.oracle, &self.settings, url) {
            Ok(metrics) => AuditResult::success(url, metrics),
            Err(err) => {
                warn!("audit failed: {err}");
                AuditResult::failure(url, &err)
            }
        }
    }

    pub fn run_batch(&self, candidates: &[String]) -> Vec<AuditResult> {
        self.run_batch_with(candidates, |_| ControlFlow::Continue(()))
            .results
    }

    /// Audits every valid candidate in order, one at a time. `on_progress`
    /// is called before each URL and once at the end; `Break` stops the
    /// batch before the next URL starts.
    pub fn run_batch_with<F>(&self, candidates: &[String], mut on_progress: F) -> BatchRun
    where
        F: FnMut(&Progress) -> ControlFlow<()>,
    {
        let (urls, rejected) = prefilter(candidates);
        for r in &rejected {
            warn!("skipping input: {}", r.error);
        }

        let total = urls.len();
        let started = Instant::now();
        let mut results = Vec::with_capacity(total);
        let mut cancelled = false;

        for (i, url) in urls.iter().enumerate() {
            let snapshot = Progress {
                completed: i,
                total,
                current_url: Some(url.clone()),
                eta: estimate_remaining(started.elapsed(), i, total - i),
            };
            if on_progress(&snapshot).is_break() {
                info!("batch cancelled after {i}/{total} URLs");
                cancelled = true;
                break;
            }

            info!("[{}/{}] auditing {url}", i + 1, total);
            let result = self.audit_valid(url);
            results.push(result);
        }

        if !cancelled {
            // Nothing is left to stop, so a Break here has no effect.
            let _ = on_progress(&Progress {
                completed: results.len(),
                total,
                current_url: None,
                eta: Some(Duration::ZERO),
            });
        }

        BatchRun {
            results,
            rejected,
            cancelled,
        }
    }
}

/// Running-average projection: `remaining * elapsed / completed`. Unknown
/// until at least one URL has completed.
pub fn estimate_remaining(elapsed: Duration, completed: usize, remaining: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let per_url = elapsed.as_secs_f64() / completed as f64;
    Some(Duration::from_secs_f64(per_url * remaining as f64))
}

/// Accepts absolute `http`/`https` URLs with a host, returned trimmed.
pub fn validate_url(input: &str) -> Result<String, AuditError> {
    let trimmed = input.trim();
    let invalid = |reason: String| AuditError::InvalidUrl {
        input: input.to_string(),
        reason,
    };
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Splits candidates into auditable URLs (input order kept) and rejects.
pub fn prefilter(candidates: &[String]) -> (Vec<String>, Vec<RejectedInput>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for c in candidates {
        match validate_url(c) {
            Ok(url) => accepted.push(url),
            Err(err) => rejected.push(RejectedInput {
                input: c.clone(),
                error: err.to_string(),
            }),
        }
    }
    (accepted, rejected)
}

/// Newline- or comma-delimited candidates. Blank entries and `#` comment
/// lines are dropped.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
