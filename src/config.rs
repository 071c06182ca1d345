use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub oracle: Oracle,
    #[serde(default)]
    pub stabilizer: Stabilizer,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub batch_name: String,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            batch_name: "default".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            work_dir: ".gtm-audit-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Oracle {
    pub lighthouse_exe: String,
    /// `auto` tries `CHROME_PATH`, then common binary names on `PATH`.
    pub chrome_exe: String,
    pub chrome_flags: Vec<String>,
    pub debugging_port: u16,
    pub launch_timeout_seconds: u64,
    pub round_timeout_seconds: u64,
    pub doctor_timeout_seconds: u64,
    pub extra_args: Vec<String>,
    pub config_path: String,
    pub env: std::collections::BTreeMap<String, String>,
}
impl Default for Oracle {
    fn default() -> Self {
        Self {
            lighthouse_exe: "lighthouse".into(),
            chrome_exe: "auto".into(),
            chrome_flags: vec![
                "--headless=new".into(),
                "--no-sandbox".into(),
                "--disable-gpu".into(),
                "--disable-dev-shm-usage".into(),
            ],
            debugging_port: 9222,
            launch_timeout_seconds: 15,
            round_timeout_seconds: 90,
            doctor_timeout_seconds: 20,
            extra_args: vec![],
            config_path: "".into(),
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Stabilizer {
    pub run_count: u32,
    /// When false, rounds that fail are skipped and the URL only fails if no
    /// round succeeds.
    pub require_all_runs: bool,
    /// Deadline for all rounds of one URL; 0 disables it.
    pub url_timeout_seconds: u64,
}
impl Default for Stabilizer {
    fn default() -> Self {
        Self {
            run_count: 3,
            require_all_runs: true,
            url_timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_results_json: bool,
    pub write_summary_json: bool,
    pub write_csv: bool,
    pub write_index_json: bool,
    pub results_filename: String,
    pub summary_filename: String,
    pub csv_filename: String,
    pub overwrite: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_results_json: true,
            write_summary_json: true,
            write_csv: true,
            write_index_json: true,
            results_filename: "results.json".into(),
            summary_filename: "summary.json".into(),
            csv_filename: "results.csv".into(),
            overwrite: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_oracle_stderr: bool,
    pub dump_effective_config: bool,
    pub dump_raw_reports: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_oracle_stderr: true,
            dump_effective_config: true,
            dump_raw_reports: false,
        }
    }
}
