use crate::{model::{AuditResult, BatchSummary}, stats::KeyedMean};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Good,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: u64,
    pub critical: u64,
}

pub const CPU_THRESHOLDS: Thresholds = Thresholds {
    warning: 500,
    critical: 1000,
};

/// Shared by script evaluation and script parse time.
pub const SCRIPT_THRESHOLDS: Thresholds = Thresholds {
    warning: 200,
    critical: 500,
};

impl MetricKind {
    pub fn thresholds(self) -> Thresholds {
        match self {
            MetricKind::Cpu => CPU_THRESHOLDS,
            MetricKind::Script => SCRIPT_THRESHOLDS,
        }
    }
}

/// Both bounds are inclusive: a value equal to the warning threshold is
/// still good.
pub fn classify(value_ms: u64, kind: MetricKind) -> Rating {
    let t = kind.thresholds();
    if value_ms <= t.warning {
        Rating::Good
    } else if value_ms <= t.critical {
        Rating::Warning
    } else {
        Rating::Critical
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRatings {
    pub cpu: Rating,
    pub script_evaluation: Rating,
    pub script_parse: Rating,
}

impl SummaryRatings {
    pub fn of(summary: &BatchSummary) -> Self {
        Self {
            cpu: classify(summary.average_cpu_time_ms, MetricKind::Cpu),
            script_evaluation: classify(summary.average_script_evaluation_ms, MetricKind::Script),
            script_parse: classify(summary.average_script_parse_time_ms, MetricKind::Script),
        }
    }
}

/// Batch statistics over every container of every successful result. Each
/// container counts once, so multi-container pages weigh more.
pub fn summarize(results: &[AuditResult]) -> BatchSummary {
    let successes: Vec<&AuditResult> = results.iter().filter(|r| r.is_success()).collect();

    let acc: KeyedMean<(), 3> = successes
        .iter()
        .flat_map(|r| r.gtm_metrics.iter())
        .map(|m| {
            (
                (),
                [
                    m.total_cpu_time_ms as f64,
                    m.script_evaluation_ms as f64,
                    m.script_parse_time_ms as f64,
                ],
            )
        })
        .collect();

    let total_containers = successes.iter().map(|r| r.gtm_metrics.len()).sum();
    let [cpu, eval, parse] = acc
        .finish()
        .into_iter()
        .next()
        .map(|(_, means)| means)
        .unwrap_or([0; 3]);

    BatchSummary {
        total_urls: results.len(),
        successful_audits: successes.len(),
        total_containers,
        average_cpu_time_ms: cpu,
        average_script_evaluation_ms: eval,
        average_script_parse_time_ms: parse,
    }
}
