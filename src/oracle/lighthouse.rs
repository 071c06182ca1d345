use super::{
    types::{LighthouseReport, OracleDiag, RawScriptReport, BOOTUP_AUDIT},
    BrowserSession, Oracle,
};
use crate::{config::Config, error::AuditError, util::ensure_dir};
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives the Lighthouse CLI against a headless Chrome it launches itself.
pub struct LighthouseOracle {
    cfg: Config,
    lighthouse_exe: PathBuf,
    chrome_exe: PathBuf,
}

impl LighthouseOracle {
    pub fn new(cfg: &Config) -> Result<Self> {
        let lighthouse_exe = expand_tilde(cfg.oracle.lighthouse_exe.trim());
        if lighthouse_exe.as_os_str().is_empty() {
            return Err(anyhow!("oracle.lighthouse_exe is empty"));
        }
        let chrome_exe = resolve_chrome_exe(&cfg.oracle.chrome_exe)?;
        if !cfg.oracle.config_path.is_empty() && !Path::new(&cfg.oracle.config_path).exists() {
            return Err(anyhow!(
                "missing lighthouse config: {}",
                cfg.oracle.config_path
            ));
        }
        Ok(Self {
            cfg: cfg.clone(),
            lighthouse_exe,
            chrome_exe,
        })
    }

    fn version_of(&self, exe: &Path) -> Result<String> {
        let mut cmd = Command::new(exe);
        cmd.arg("--version");
        let output = run_with_timeout(
            cmd,
            Duration::from_secs(self.cfg.oracle.doctor_timeout_seconds.max(1)),
        )?
        .ok_or_else(|| anyhow!("{} --version timed out", exe.display()))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} --version failed: {}",
                exe.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn profile_dir(&self) -> PathBuf {
        Path::new(&self.cfg.paths.work_dir).join(format!(
            "chrome-profile-{}",
            self.cfg.oracle.debugging_port
        ))
    }
}

impl Oracle for LighthouseOracle {
    fn doctor(&self) -> Result<OracleDiag> {
        let mut errors = Vec::new();
        let lighthouse_version = self
            .version_of(&self.lighthouse_exe)
            .map_err(|e| errors.push(format!("{e:#}")))
            .ok();
        let chrome_version = self
            .version_of(&self.chrome_exe)
            .map_err(|e| errors.push(format!("{e:#}")))
            .ok();
        Ok(OracleDiag {
            lighthouse_exe: self.lighthouse_exe.display().to_string(),
            lighthouse_version,
            chrome_exe: self.chrome_exe.display().to_string(),
            chrome_version,
            ok: errors.is_empty(),
            errors,
        })
    }

    fn acquire(&self) -> Result<Box<dyn BrowserSession + '_>> {
        let port = self.cfg.oracle.debugging_port;
        let profile = self.profile_dir();
        ensure_dir(&profile)?;

        let mut cmd = Command::new(&self.chrome_exe);
        cmd.args(&self.cfg.oracle.chrome_flags);
        cmd.arg(format!("--remote-debugging-port={port}"));
        cmd.arg(format!("--user-data-dir={}", profile.display()));
        cmd.arg("--no-first-run");
        cmd.arg("--no-default-browser-check");
        cmd.arg("about:blank");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        for (k, v) in &self.cfg.oracle.env {
            cmd.env(k, v);
        }

        debug!("chrome launch {} port={port}", self.chrome_exe.display());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("launching chrome: {}", self.chrome_exe.display()))?;

        let timeout = Duration::from_secs(self.cfg.oracle.launch_timeout_seconds.max(1));
        if let Err(err) = wait_for_port(&mut child, port, timeout) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
        info!("chrome ready on port {port} (pid {})", child.id());

        Ok(Box::new(LighthouseSession {
            oracle: self,
            chrome: Some(child),
        }))
    }
}

struct LighthouseSession<'a> {
    oracle: &'a LighthouseOracle,
    chrome: Option<Child>,
}

impl LighthouseSession<'_> {
    fn lighthouse_command(&self, url: &str) -> Command {
        let cfg = &self.oracle.cfg.oracle;
        let mut cmd = Command::new(&self.oracle.lighthouse_exe);
        cmd.arg(url);
        cmd.arg(format!("--port={}", cfg.debugging_port));
        cmd.arg("--output=json");
        cmd.arg("--output-path=stdout");
        cmd.arg("--quiet");
        cmd.arg(format!("--only-audits={BOOTUP_AUDIT}"));
        if !cfg.config_path.is_empty() {
            cmd.arg(format!("--config-path={}", cfg.config_path));
        }
        cmd.args(&cfg.extra_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        for (k, v) in &cfg.env {
            cmd.env(k, v);
        }
        cmd
    }
}

impl BrowserSession for LighthouseSession<'_> {
    fn measure(&mut self, url: &str) -> Result<RawScriptReport> {
        if self.chrome.is_none() {
            return Err(anyhow!("chrome session is not running"));
        }
        let secs = self.oracle.cfg.oracle.round_timeout_seconds;
        debug!("lighthouse run {url} timeout={secs}s");

        let cmd = self.lighthouse_command(url);
        let output = if secs > 0 {
            run_with_timeout(cmd, Duration::from_secs(secs))?.ok_or_else(|| AuditError::Timeout {
                url: url.to_string(),
                stage: "running lighthouse".to_string(),
                after: Duration::from_secs(secs),
            })?
        } else {
            let mut cmd = cmd;
            cmd.output().with_context(|| "running lighthouse")?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "lighthouse exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        if self.oracle.cfg.debug.keep_oracle_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("lighthouse stderr {url}: {}", stderr.trim());
        }

        let lhr: LighthouseReport = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parsing lighthouse JSON output for {url}"))?;
        lhr.into_script_report(url).map_err(|msg| anyhow!(msg))
    }

    fn release(&mut self) -> Result<()> {
        let Some(mut child) = self.chrome.take() else {
            return Ok(());
        };
        let pid = child.id();
        if child.try_wait().with_context(|| "try_wait chrome")?.is_none() {
            child.kill().with_context(|| format!("killing chrome pid {pid}"))?;
        }
        child
            .wait()
            .with_context(|| format!("reaping chrome pid {pid}"))?;
        debug!("chrome pid {pid} released");
        Ok(())
    }
}

fn resolve_chrome_exe(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("CHROME_PATH") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return Ok(p);
            }
        }
        for name in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Some(p) = find_on_path(name) {
                return Ok(p);
            }
        }
        return Err(anyhow!(
            "no chrome binary found; set CHROME_PATH or oracle.chrome_exe"
        ));
    }
    Ok(expand_tilde(raw))
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_for_port(child: &mut Child, port: u16, timeout: Duration) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait chrome")? {
            return Err(anyhow!("chrome exited during launch with {status}"));
        }
        if TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok() {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(anyhow!(
                "chrome did not open debugging port {port} within {:?}",
                timeout
            ));
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// Runs `cmd` to completion, or kills it once `timeout` passes and returns
/// `Ok(None)`.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Option<Output>> {
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd.spawn().with_context(|| format!("spawning {:?}", cmd.get_program()))?;

    // Drain pipes while waiting; a full report on stdout would otherwise block
    // the child forever.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Some(Output {
                status,
                stdout,
                stderr,
            }));
        }

        if start.elapsed() > timeout {
            warn!("{:?} timed out after {:?}", cmd.get_program(), timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let _ = stdout_thread.join();
            let _ = stderr_thread.join();
            return Ok(None);
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
