//! CLI binary for edgequake-docfix.
//!
//! `docfix serve` runs the HTTP service; `docfix check` runs the whole
//! upload → compliance → correction flow on one local file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docfix::server::{self, DEFAULT_MAX_UPLOAD_BYTES};
use edgequake_docfix::{
    ComplianceReport, DocumentService, Operation, PipelineProgressCallback, ProgressCallback,
    ServiceConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders one progress bar per pipeline run, with a log line per chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, chunk_index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&chunk_index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, _file_id: &str, op: Operation, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        let prefix = match op {
            Operation::Compliance => "Checking",
            Operation::Correction => "Correcting",
        };
        self.bar.reset();
        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{prefix} {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, _file_id: &str, chunk_index: usize, _total: usize) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(chunk_index, Instant::now());
        }
    }

    fn on_chunk_complete(&self, _file_id: &str, chunk_index: usize, total: usize) {
        let secs = self.elapsed_secs(chunk_index);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            chunk_index + 1,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, _file_id: &str, chunk_index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(chunk_index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_index + 1,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
    }

    fn on_pipeline_complete(&self, _file_id: &str, op: Operation, total: usize, done: usize) {
        self.bar.finish_and_clear();
        if done == total && self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!("{} {} finished: {} chunks", green("✔"), op, bold(&done.to_string()));
        } else {
            eprintln!("{} {} stopped after {}/{} chunks", red("✘"), op, done, total);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 8000
  docfix serve --port 8000

  # Check and correct one document locally
  docfix check report.docx -o report.fixed.docx

  # Compliance report only, as JSON
  docfix check paper.pdf --report-only --json > report.json

  # Use a specific provider and model
  docfix --provider openai --model gpt-4.1-mini check letter.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider, gemini-2.0-flash)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. edgequake_docfix=debug)

A .env file in the working directory is loaded at startup.
"#;

/// Check PDF/DOCX documents for writing compliance and correct them.
#[derive(Parser, Debug)]
#[command(
    name = "docfix",
    version,
    about = "Check PDF/DOCX documents for grammar and style compliance and correct them with LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCFIX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCFIX_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Maximum characters per chunk; paragraphs are never split.
    #[arg(long, global = true, env = "DOCFIX_MAX_CHUNK_CHARS", default_value_t = 2000)]
    max_chunk_chars: usize,

    /// Concurrent LLM calls per pipeline.
    #[arg(short, long, global = true, env = "DOCFIX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, global = true, env = "DOCFIX_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "DOCFIX_PROVIDER")]
    provider: Option<String>,

    /// Per-call LLM timeout in seconds.
    #[arg(long, global = true, env = "DOCFIX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Retries per chunk on LLM failure.
    #[arg(long, global = true, env = "DOCFIX_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Directory for corrected documents.
    #[arg(long, global = true, env = "DOCFIX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve {
        /// Address to bind.
        #[arg(long, env = "DOCFIX_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        /// Port to listen on.
        #[arg(long, env = "DOCFIX_PORT", default_value_t = 8000)]
        port: u16,

        /// Maximum upload size in MiB.
        #[arg(long, env = "DOCFIX_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_BYTES / (1024 * 1024))]
        max_upload_mb: usize,
    },

    /// Check (and by default correct) one local PDF or DOCX file.
    Check {
        /// Input PDF or DOCX file.
        file: PathBuf,

        /// Where to write the corrected DOCX (default: <output-dir>/corrected_<name>.docx).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only run the compliance check.
        #[arg(long)]
        report_only: bool,

        /// Print results as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active.
    let show_progress = match cli.command {
        Command::Check { json, .. } => !cli.quiet && !json,
        Command::Serve { .. } => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli.service, progress)?;

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload_mb,
        } => {
            let service = DocumentService::new(config).context("Failed to initialise service")?;
            let addr = SocketAddr::new(host, port);
            server::serve(service, addr, max_upload_mb.saturating_mul(1024 * 1024))
                .await
                .with_context(|| format!("Server on {addr} failed"))?;
        }
        Command::Check {
            file,
            output,
            report_only,
            json,
        } => check(config, file, output, report_only, json, cli.quiet).await?,
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(args: &ServiceArgs, progress: Option<ProgressCallback>) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .max_chunk_chars(args.max_chunk_chars)
        .concurrency(args.concurrency)
        .api_timeout_secs(args.api_timeout)
        .max_retries(args.max_retries)
        .output_dir(args.output_dir.clone());

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Run upload → compliance → (correction) on one file.
async fn check(
    config: ServiceConfig,
    file: PathBuf,
    output: Option<PathBuf>,
    report_only: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let output_dir = config.output_dir.clone();
    let service = DocumentService::new(config).context("Failed to initialise service")?;

    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let receipt = service
        .upload(&filename, bytes)
        .await
        .context("Upload rejected")?;
    if !quiet && !json {
        eprintln!(
            "{} {}  {} paragraphs, {} chunks",
            cyan("◆"),
            bold(&filename),
            receipt.paragraph_count,
            receipt.chunk_count
        );
    }

    service
        .start_compliance(&receipt.file_id)
        .await?
        .wait()
        .await
        .context("Compliance check failed")?;
    let status = service.status(&receipt.file_id).await?;

    let mut written: Option<PathBuf> = None;
    if !report_only {
        service
            .start_correction(&receipt.file_id)
            .await?
            .wait()
            .await
            .context("Correction failed")?;

        let download = service.download(&receipt.file_id).await?;
        let path = output.unwrap_or_else(|| output_dir.join(&download.filename));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &download.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written = Some(path);
    }

    if json {
        let job = service.job(&receipt.file_id).await?;
        let fallbacks = job.corrected_chunks.iter().filter(|c| c.fallback).count();
        let doc = json!({
            "file_id": receipt.file_id,
            "filename": filename,
            "format": receipt.format,
            "chunks": receipt.chunk_count,
            "compliance_reports": status.compliance_reports,
            "fallback_chunks": fallbacks,
            "output_path": written,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&doc).context("Failed to serialise output")?
        );
    } else if !quiet {
        print_reports(&status.compliance_reports);
        if let Some(ref path) = written {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

fn print_reports(reports: &[ComplianceReport]) {
    let issues: usize = reports.iter().map(|r| r.issues.len()).sum();
    let compliant = reports.iter().filter(|r| r.compliant).count();
    println!(
        "{}  {}/{} chunks compliant, {} issue(s)",
        bold("Compliance"),
        compliant,
        reports.len(),
        issues
    );

    for report in reports {
        let mark = if report.compliant {
            green("✓")
        } else {
            yellow("!")
        };
        println!(
            "\n{} Chunk {}  {}",
            mark,
            report.chunk_index + 1,
            dim(&report.summary)
        );
        for issue in &report.issues {
            let category = serde_json::to_value(issue.category)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            println!("    [{}] {}", cyan(&category), issue.issue);
            if let Some(ref excerpt) = issue.excerpt {
                println!("        {}", dim(&format!("\"{excerpt}\"")));
            }
            if !issue.suggestion.is_empty() {
                println!("        → {}", issue.suggestion);
            }
        }
    }
}
