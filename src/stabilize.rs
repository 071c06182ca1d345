use crate::{
    config::Config,
    error::AuditError,
    extract::extract,
    model::{ContainerMetric, ContainerSample},
    oracle::{Oracle, SessionGuard},
    stats::KeyedMean,
};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct StabilizerSettings {
    pub run_count: u32,
    pub require_all_runs: bool,
    pub url_timeout: Option<Duration>,
    pub dump_raw_reports: bool,
}

impl StabilizerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            run_count: cfg.stabilizer.run_count.max(1),
            require_all_runs: cfg.stabilizer.require_all_runs,
            url_timeout: match cfg.stabilizer.url_timeout_seconds {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            dump_raw_reports: cfg.debug.dump_raw_reports,
        }
    }
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Measures `url` `run_count` times on one browser session and averages the
/// per-container timings by container ID.
pub fn stabilize(
    oracle: &dyn Oracle,
    settings: &StabilizerSettings,
    url: &str,
) -> Result<Vec<ContainerMetric>, AuditError> {
    let started = Instant::now();
    let mut session = SessionGuard::acquire(oracle)
        .map_err(|e| AuditError::from_anyhow(url, e.context("browser launch failed")))?;

    let mut acc: KeyedMean<String, 3> = KeyedMean::new();
    let mut last_err = None;

    for round in 1..=settings.run_count {
        if let Some(deadline) = settings.url_timeout {
            if started.elapsed() > deadline {
                return Err(AuditError::Timeout {
                    url: url.to_string(),
                    stage: format!("starting round {round}/{}", settings.run_count),
                    after: deadline,
                });
            }
        }

        let round_started = Instant::now();
        let outcome = session
            .measure(url)
            .map_err(|e| AuditError::from_anyhow(url, e))
            .and_then(|report| {
                if settings.dump_raw_reports {
                    debug!(?report, "raw report round {round}");
                }
                extract(&report)
            });

        match outcome {
            Ok(samples) => {
                info!(
                    "{url} round {round}/{} containers={} in {:?}",
                    settings.run_count,
                    samples.len(),
                    round_started.elapsed()
                );
                accumulate(&mut acc, samples);
            }
            Err(err) if settings.require_all_runs => return Err(err),
            Err(err) => {
                warn!("{url} round {round}/{} skipped: {err}", settings.run_count);
                last_err = Some(err);
            }
        }
    }

    if let Err(err) = session.finish() {
        warn!("{url}: browser session release failed: {err:#}");
    }

    if acc.is_empty() {
        return Err(last_err.unwrap_or_else(|| AuditError::NoContainerFound {
            url: url.to_string(),
        }));
    }

    Ok(acc
        .finish()
        .into_iter()
        .map(|(container_id, [cpu, eval, parse])| ContainerMetric {
            container_id,
            total_cpu_time_ms: cpu,
            script_evaluation_ms: eval,
            script_parse_time_ms: parse,
        })
        .collect())
}

/// Folds one round into `acc`. A container reported more than once in the
/// same round contributes a single sample: the mean of its entries.
fn accumulate(acc: &mut KeyedMean<String, 3>, samples: Vec<ContainerSample>) {
    let round: KeyedMean<String, 3> = samples
        .into_iter()
        .map(|s| {
            (
                s.container_id,
                [
                    s.total_cpu_time_ms,
                    s.script_evaluation_ms,
                    s.script_parse_time_ms,
                ],
            )
        })
        .collect();
    for (container_id, means) in round.finish_exact() {
        acc.add(container_id, means);
    }
}
