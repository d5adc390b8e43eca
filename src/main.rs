use clap::Parser;
use ripper::audit::AuditLogger;
use ripper::generator::{estimate_tokens, parse_generated_commands};
use ripper::utils::logging::init_logging;
use ripper::{AppResult, BatchReport, BatchRunner, Config, IterationHistory, Policy};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Validate and run a batch of generated read-only exploration commands.
///
/// Commands are read from stdin, either as a JSON array of strings or one per
/// line. The aggregated output is written to stdout.
#[derive(Parser, Debug)]
#[command(name = "ripper")]
#[command(version, about)]
struct Args {
    /// Directory to explore; every command runs with this as its working directory.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Config file (defaults to ~/.config/ripper/config.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Policy file overriding the built-in read-only policy.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Print the full batch report as JSON instead of the aggregated text.
    #[arg(long)]
    json: bool,

    /// Run the seed commands before reading stdin and print their context first.
    #[arg(long)]
    initial_context: bool,

    /// JSON history file to continue from; updated after the batch. The
    /// bounded feedback for the next round is written to stderr.
    #[arg(long)]
    history: Option<PathBuf>,

    /// Log level for this crate when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AppResult<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let policy_path = args.policy.as_ref().or(config.policy.path.as_ref());
    let policy = match policy_path {
        Some(path) => Policy::load(path)?,
        None => Policy::read_only_default()?,
    };

    let mut runner = BatchRunner::new(Arc::new(policy), config.limits.clone(), &args.dir)?;
    if config.audit.enabled {
        let audit = match &config.audit.log_path {
            Some(path) => AuditLogger::with_path(path)?,
            None => AuditLogger::new()?,
        };
        runner = runner.with_audit(audit);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling batch");
            on_signal.cancel();
        }
    });

    if args.initial_context {
        let (context, _) = runner.initial_context(&cancel).await;
        println!("{}", context);
    }

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let commands = parse_generated_commands(&input);

    let history = match &args.history {
        Some(path) if path.exists() => load_history(path)?,
        _ => IterationHistory::new(),
    };

    let (report, history) = runner.run(commands.as_slice(), &history, &cancel).await;

    if let Some(path) = &args.history {
        fs::write(path, serde_json::to_string_pretty(&history)?)?;
        eprint!("{}", history.feedback(&config.history).render());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn load_history(path: &Path) -> AppResult<IterationHistory> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_report(report: &BatchReport) {
    let text = report.render();
    print!("{}", text);

    let summary = &report.summary;
    eprintln!(
        "generated: {}, valid: {}, rejected: {}, dropped: {}, timed out: {}, budget skipped: {}, cancelled: {}",
        summary.generated,
        summary.valid,
        summary.rejected,
        summary.dropped,
        summary.timed_out,
        summary.budget_skipped,
        summary.cancelled
    );
    eprintln!(
        "output: {} bytes (~{} tokens){}",
        summary.total_bytes,
        estimate_tokens(&text),
        if summary.budget_reached { ", budget reached" } else { "" }
    );

    for record in &report.records {
        if let Some(reason) = record.outcome.reason() {
            eprintln!("  rejected: {} ({})", record.candidate.raw, reason);
        }
    }
}
