use crate::{
    config::Config,
    export,
    model::AuditResult,
    oracle::{lighthouse::LighthouseOracle, Oracle},
    pipeline::{parse_url_list, prefilter, Pipeline, Progress},
    summary::{summarize, SummaryRatings},
    util::{batch_id, ensure_dir, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "gtm-audit")]
#[command(about = "Sequential, multi-run CPU cost auditor for Google Tag Manager containers")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./gtm-audit.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that lighthouse and chrome are runnable.
    Doctor {},
    /// Audit a single URL and print its result.
    Audit {
        #[arg(long)]
        url: String,
    },
    /// Audit a list of URLs sequentially and write batch outputs.
    Batch {
        #[command(flatten)]
        source: BatchSource,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct BatchSource {
    /// File with one URL per line (commas also split; `#` starts a comment).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Comma-separated URLs.
    #[arg(long, value_delimiter = ',')]
    urls: Option<Vec<String>>,
}

/// Returns the process exit code.
pub fn dispatch(args: Args) -> Result<i32> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = match cfg_path {
        Some(p) => Config::load(&p)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, None)?;
            doctor(&cfg)
        }
        Command::Audit { url } => {
            let log_path = resolve_log_path(&cfg, None);
            let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
            audit(&cfg, url)
        }
        Command::Batch { source, out_dir } => batch(&args, &cfg, source, out_dir.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["gtm-audit.toml", "gtm-audit.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<i32> {
    let oracle = LighthouseOracle::new(cfg)?;
    let diag = oracle.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(if diag.ok { 0 } else { 1 })
}

fn audit(cfg: &Config, url: &str) -> Result<i32> {
    let oracle = LighthouseOracle::new(cfg)?;
    let pipeline = Pipeline::new(cfg, oracle);

    let (status, result) = match pipeline.audit_url(url) {
        Ok(result) if result.is_success() => (200, result),
        Ok(result) => (500, result),
        Err(err) => (err.http_status(), AuditResult::failure(url, &err)),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "http_status": status,
            "result": result,
        }))?
    );
    Ok(match status {
        200 => 0,
        400 => 2,
        _ => 1,
    })
}

fn batch(args: &Args, cfg: &Config, source: &BatchSource, out_override: Option<&Path>) -> Result<i32> {
    let candidates = match (&source.input, &source.urls) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading URL list: {}", path.display()))?;
            parse_url_list(&raw)
        }
        (None, Some(urls)) => urls.iter().flat_map(|u| parse_url_list(u)).collect(),
        (None, None) => return Err(anyhow!("either --input or --urls is required")),
    };

    let (urls, _) = prefilter(&candidates);
    if urls.is_empty() {
        return Err(anyhow!(
            "no valid http(s) URLs among {} inputs",
            candidates.len()
        ));
    }

    let id = batch_id(&cfg.normalized_for_hash(), &urls);
    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    let batch_dir = out_root.join(&id);

    if batch_dir.exists() && !cfg.output.overwrite {
        return Err(anyhow!(
            "batch_dir already exists and overwrite=false: {}",
            batch_dir.display()
        ));
    }
    ensure_dir(&batch_dir.join("logs"))?;

    let log_path = resolve_log_path(cfg, Some(&batch_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("batch_id={id} urls={} out={}", urls.len(), batch_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(batch_dir.join("effective-config.toml"), raw)?;
    }

    // Fail on a broken oracle before any URL is attempted.
    let oracle = LighthouseOracle::new(cfg)?;
    let pipeline = Pipeline::new(cfg, oracle);

    let started = now_rfc3339();
    let run = pipeline.run_batch_with(&candidates, |p: &Progress| {
        if let Some(url) = &p.current_url {
            let eta = p
                .eta
                .map(|d| format!("{}s", d.as_secs()))
                .unwrap_or_else(|| "?".to_string());
            info!("progress {}/{} next={url} eta={eta}", p.completed, p.total);
        }
        ControlFlow::Continue(())
    });

    let summary = summarize(&run.results);
    let ratings = SummaryRatings::of(&summary);

    if cfg.output.write_results_json {
        std::fs::write(
            batch_dir.join(&cfg.output.results_filename),
            serde_json::to_string_pretty(&run.results)?,
        )?;
    }

    if cfg.output.write_summary_json {
        std::fs::write(
            batch_dir.join(&cfg.output.summary_filename),
            serde_json::to_string_pretty(&serde_json::json!({
                "summary": summary,
                "ratings": ratings,
            }))?,
        )?;
    }

    if cfg.output.write_csv {
        export::write_csv(&run.results, &batch_dir.join(&cfg.output.csv_filename))?;
    }

    if cfg.output.write_index_json {
        let index = serde_json::json!({
            "batch_id": id,
            "batch_name": cfg.global.batch_name,
            "started": started,
            "finished": now_rfc3339(),
            "rejected": run.rejected,
            "results": cfg.output.results_filename,
            "summary": cfg.output.summary_filename,
            "csv": cfg.output.csv_filename,
        });
        std::fs::write(batch_dir.join("index.json"), serde_json::to_string_pretty(&index)?)?;
    }

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "batch_id": id,
                "batch_dir": batch_dir,
                "summary": summary,
                "ratings": ratings,
            }))?
        );
    }

    Ok(0)
}

fn resolve_log_path(cfg: &Config, batch_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(batch_dir) = batch_dir {
        return Some(batch_dir.join("logs").join("gtm-audit.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("gtm-audit.log"))
}
