use crate::model::AuditResult;
use anyhow::{Context, Result};
use std::path::Path;

pub const CSV_HEADER: [&str; 7] = [
    "url",
    "status",
    "container_id",
    "total_cpu_time_ms",
    "script_evaluation_ms",
    "script_parse_time_ms",
    "error",
];

/// One row per (url, container) on success, one row per failed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub url: String,
    pub status: String,
    pub container_id: Option<String>,
    pub total_cpu_time_ms: Option<u64>,
    pub script_evaluation_ms: Option<u64>,
    pub script_parse_time_ms: Option<u64>,
    pub error: Option<String>,
}

pub fn rows(results: &[AuditResult]) -> Vec<ExportRow> {
    let mut out = Vec::new();
    for r in results {
        if r.is_success() {
            for m in &r.gtm_metrics {
                out.push(ExportRow {
                    url: r.url.clone(),
                    status: "success".into(),
                    container_id: Some(m.container_id.clone()),
                    total_cpu_time_ms: Some(m.total_cpu_time_ms),
                    script_evaluation_ms: Some(m.script_evaluation_ms),
                    script_parse_time_ms: Some(m.script_parse_time_ms),
                    error: None,
                });
            }
        } else {
            out.push(ExportRow {
                url: r.url.clone(),
                status: "error".into(),
                container_id: None,
                total_cpu_time_ms: None,
                script_evaluation_ms: None,
                script_parse_time_ms: None,
                error: Some(r.error.clone().unwrap_or_default()),
            });
        }
    }
    out
}

pub fn to_csv(results: &[AuditResult]) -> String {
    let mut s = CSV_HEADER.join(",");
    s.push('\n');
    for row in rows(results) {
        let fields = [
            row.url,
            row.status,
            row.container_id.unwrap_or_default(),
            opt_num(row.total_cpu_time_ms),
            opt_num(row.script_evaluation_ms),
            opt_num(row.script_parse_time_ms),
            row.error.unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        s.push_str(&line.join(","));
        s.push('\n');
    }
    s
}

pub fn write_csv(results: &[AuditResult], path: &Path) -> Result<()> {
    std::fs::write(path, to_csv(results))
        .with_context(|| format!("writing CSV: {}", path.display()))
}

fn opt_num(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
