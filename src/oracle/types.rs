use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized per-page script boot-up breakdown. Missing numeric fields are
/// already defaulted to 0 here, so nothing downstream sees optional timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScriptReport {
    pub page_url: String,
    pub entries: Vec<RawScriptEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScriptEntry {
    pub script_url: String,
    pub total_cpu_time_ms: f64,
    pub script_evaluation_ms: f64,
    pub parse_compile_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleDiag {
    pub lighthouse_exe: String,
    pub lighthouse_version: Option<String>,
    pub chrome_exe: String,
    pub chrome_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// The slice of a Lighthouse JSON report (LHR) that the audit reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseReport {
    #[serde(default)]
    pub requested_url: Option<String>,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub runtime_error: Option<LighthouseRuntimeError>,
    #[serde(default)]
    pub audits: BTreeMap<String, LighthouseAudit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LighthouseRuntimeError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseAudit {
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub details: Option<LighthouseDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LighthouseDetails {
    #[serde(default)]
    pub items: Vec<BootupItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootupItem {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub scripting: Option<f64>,
    #[serde(default)]
    pub script_parse_compile: Option<f64>,
}

pub const BOOTUP_AUDIT: &str = "bootup-time";

impl LighthouseReport {
    /// Runtime errors and audit-level errors are returned as `Err(message)`.
    /// An absent `bootup-time` audit yields an empty entry list.
    pub fn into_script_report(self, fallback_url: &str) -> Result<RawScriptReport, String> {
        if let Some(err) = self.runtime_error.filter(|e| e.code.as_deref() != Some("NO_ERROR")) {
            let code = err.code.unwrap_or_else(|| "UNKNOWN".to_string());
            let message = err.message.unwrap_or_default();
            return Err(format!("lighthouse runtime error {code}: {message}"));
        }

        let page_url = self
            .final_url
            .or(self.requested_url)
            .unwrap_or_else(|| fallback_url.to_string());

        let audit = self.audits.get(BOOTUP_AUDIT);
        if let Some(msg) = audit.and_then(|a| a.error_message.as_deref()) {
            return Err(format!("{BOOTUP_AUDIT} audit failed: {msg}"));
        }

        let entries = audit
            .and_then(|a| a.details.as_ref())
            .map(|d| {
                d.items
                    .iter()
                    .map(|item| RawScriptEntry {
                        script_url: item.url.clone().unwrap_or_default(),
                        total_cpu_time_ms: non_negative(item.total),
                        script_evaluation_ms: non_negative(item.scripting),
                        parse_compile_ms: non_negative(item.script_parse_compile),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawScriptReport { page_url, entries })
    }
}

fn non_negative(v: Option<f64>) -> f64 {
    match v {
        Some(x) if x.is_finite() && x > 0.0 => x,
        _ => 0.0,
    }
}
