#![allow(dead_code)]

use anyhow::{anyhow, Result};
use gtm_audit::{
    error::AuditError,
    oracle::{BrowserSession, Oracle, OracleDiag, RawScriptEntry, RawScriptReport},
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

/// What one scripted measurement round returns.
#[derive(Debug, Clone)]
pub enum Round {
    /// `(script_url, total, scripting, parse)` entries.
    Report(Vec<(String, f64, f64, f64)>),
    Fail(&'static str),
    Timeout,
}

pub fn gtm(id: &str) -> String {
    format!("https://www.googletagmanager.com/gtm.js?id={id}")
}

/// A round with one GTM entry per `(id, total_cpu_ms)` pair and a
/// first-party script that must be ignored.
pub fn cpu_round(containers: &[(&str, f64)]) -> Round {
    let mut entries: Vec<(String, f64, f64, f64)> = containers
        .iter()
        .map(|(id, cpu)| (gtm(id), *cpu, cpu / 2.0, cpu / 10.0))
        .collect();
    entries.push(("https://site.example/app.js".to_string(), 900.0, 700.0, 50.0));
    Round::Report(entries)
}

pub fn report(page_url: &str, entries: &[(String, f64, f64, f64)]) -> RawScriptReport {
    RawScriptReport {
        page_url: page_url.to_string(),
        entries: entries
            .iter()
            .map(|(u, total, eval, parse)| RawScriptEntry {
                script_url: u.clone(),
                total_cpu_time_ms: *total,
                script_evaluation_ms: *eval,
                parse_compile_ms: *parse,
            })
            .collect(),
    }
}

/// In-memory oracle replaying scripted rounds per URL and counting session
/// lifecycle calls. Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct ScriptedOracle {
    pub plans: HashMap<String, Vec<Round>>,
    pub fail_acquire: bool,
    pub acquired: Cell<usize>,
    pub released: Cell<usize>,
    pub measured: RefCell<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(mut self, url: &str, rounds: Vec<Round>) -> Self {
        self.plans.insert(url.to_string(), rounds);
        self
    }
}

impl Oracle for ScriptedOracle {
    fn doctor(&self) -> Result<OracleDiag> {
        Ok(OracleDiag {
            lighthouse_exe: "scripted".into(),
            lighthouse_version: None,
            chrome_exe: "scripted".into(),
            chrome_version: None,
            ok: true,
            errors: vec![],
        })
    }

    fn acquire(&self) -> Result<Box<dyn BrowserSession + '_>> {
        if self.fail_acquire {
            return Err(anyhow!("chrome exited during launch"));
        }
        self.acquired.set(self.acquired.get() + 1);
        Ok(Box::new(ScriptedSession {
            oracle: self,
            round: 0,
        }))
    }
}

struct ScriptedSession<'a> {
    oracle: &'a ScriptedOracle,
    round: usize,
}

impl BrowserSession for ScriptedSession<'_> {
    fn measure(&mut self, url: &str) -> Result<RawScriptReport> {
        self.oracle.measured.borrow_mut().push(url.to_string());
        let plan = self
            .oracle
            .plans
            .get(url)
            .ok_or_else(|| anyhow!("net::ERR_NAME_NOT_RESOLVED for {url}"))?;
        let round = plan
            .get(self.round)
            .or_else(|| plan.last())
            .cloned()
            .ok_or_else(|| anyhow!("empty plan for {url}"))?;
        self.round += 1;
        match round {
            Round::Report(entries) => Ok(report(url, &entries)),
            Round::Fail(msg) => Err(anyhow!(msg)),
            Round::Timeout => Err(AuditError::Timeout {
                url: url.to_string(),
                stage: "running lighthouse".to_string(),
                after: Duration::from_secs(90),
            }
            .into()),
        }
    }

    fn release(&mut self) -> Result<()> {
        self.oracle.released.set(self.oracle.released.get() + 1);
        Ok(())
    }
}
