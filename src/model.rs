use crate::error::AuditError;
use serde::{Deserialize, Serialize};

/// One container's CPU cost, fractional milliseconds, from a single
/// measurement round. Never rounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSample {
    pub container_id: String,
    pub total_cpu_time_ms: f64,
    pub script_evaluation_ms: f64,
    pub script_parse_time_ms: f64,
}

/// Finalized per-container metric, whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetric {
    pub container_id: String,
    pub total_cpu_time_ms: u64,
    pub script_evaluation_ms: u64,
    pub script_parse_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

/// Outcome of auditing one URL. Build through `success` / `failure` so that
/// an error never carries metrics and a success never carries an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub url: String,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub gtm_metrics: Vec<ContainerMetric>,
}

impl AuditResult {
    /// Falls back to a `NoContainerFound` failure if `gtm_metrics` is empty.
    pub fn success(url: &str, gtm_metrics: Vec<ContainerMetric>) -> Self {
        if gtm_metrics.is_empty() {
            return Self::failure(
                url,
                &AuditError::NoContainerFound {
                    url: url.to_string(),
                },
            );
        }
        Self {
            url: url.to_string(),
            status: AuditStatus::Success,
            error: None,
            gtm_metrics,
        }
    }

    pub fn failure(url: &str, err: &AuditError) -> Self {
        Self {
            url: url.to_string(),
            status: AuditStatus::Error,
            error: Some(err.to_string()),
            gtm_metrics: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AuditStatus::Success
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_urls: usize,
    pub successful_audits: usize,
    pub total_containers: usize,
    pub average_cpu_time_ms: u64,
    pub average_script_evaluation_ms: u64,
    pub average_script_parse_time_ms: u64,
}
