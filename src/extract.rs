use crate::{error::AuditError, model::ContainerSample, oracle::RawScriptReport};
use regex::Regex;
use std::sync::LazyLock;

static GTM_LOADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/gtm\.js\?(?:[^#]*&)?id=(GTM-[A-Z0-9]+)(?:[&#]|$)").expect("valid GTM regex")
});

/// Container ID of a GTM loader script URL, if it is one.
pub fn container_id(script_url: &str) -> Option<&str> {
    GTM_LOADER
        .captures(script_url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// One sample per GTM loader entry in the report, in report order. Repeated
/// IDs are kept as separate samples.
pub fn extract(report: &RawScriptReport) -> Result<Vec<ContainerSample>, AuditError> {
    let samples: Vec<ContainerSample> = report
        .entries
        .iter()
        .filter_map(|entry| {
            container_id(&entry.script_url).map(|id| ContainerSample {
                container_id: id.to_string(),
                total_cpu_time_ms: entry.total_cpu_time_ms,
                script_evaluation_ms: entry.script_evaluation_ms,
                script_parse_time_ms: entry.parse_compile_ms,
            })
        })
        .collect();

    if samples.is_empty() {
        return Err(AuditError::NoContainerFound {
            url: report.page_url.clone(),
        });
    }
    Ok(samples)
}
