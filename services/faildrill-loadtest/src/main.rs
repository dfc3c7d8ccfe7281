use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use faildrill_core::{
    export_attempts, load_key_pool, read_attempts_csv, render_console, write_report,
    FailoverSummary, LoadDriver, MetricsRecorder, ReportFormat, RunConfig, StopReason, StopSignal,
};
use faildrill_store::{connect, PostgresConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{AnalyzeArgs, Cli, Commands, RunArgs};

/// Exit status when `--fail-on-sla` is set and the SLA did not pass.
const SLA_FAILED_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Analyze(args) => analyze(args),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.resolve_config().context("invalid run configuration")?;
    let target = args.write_target();
    let pg_config = PostgresConfig::from_env().context("database connection settings")?;

    print_banner(&config, &pg_config.describe());

    let store = connect(&pg_config, &target, config.workers)
        .await
        .with_context(|| format!("failed to connect to {}", pg_config.describe()))?;
    let store = Arc::new(store);

    let keys = load_key_pool(store.as_ref(), config.workers)
        .await
        .with_context(|| format!("loading reference keys from {}", target.key_table))?;
    println!("✅ Loaded {} reference keys from {}", keys.len(), target.key_table);

    println!("\n🚀 Starting load test...");
    println!("   Initiate the failover now (see instructions above)");
    println!("   Press Ctrl+C to stop early\n");

    let driver = LoadDriver::new(config.clone(), Arc::clone(&store));
    let signal = tokio::spawn(stop_on_shutdown(driver.stop_signal()));

    let outcome = driver.run(keys).await?;
    signal.abort();

    if outcome.reason == StopReason::Interrupted {
        println!("\n⏹️  Test interrupted after {:.1}s", outcome.elapsed.as_secs_f64());
    }
    println!("{}", render_console(&outcome.summary));

    match export_attempts(&config.output_dir, &driver.recorder().attempts()) {
        Ok(path) => println!("📁 Detailed results exported to: {}", path.display()),
        Err(e) => error!(error = %e, "Failed to export results"),
    }

    if let Some(format) = args.report {
        emit_report(&config.output_dir, &outcome.summary, format.into());
    }

    store.close().await;

    if args.fail_on_sla && !outcome.summary.sla.passed() {
        warn!(verdict = ?outcome.summary.sla, "SLA not met");
        std::process::exit(SLA_FAILED_EXIT_CODE);
    }

    Ok(())
}

fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let attempts = read_attempts_csv(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    info!(attempts = attempts.len(), file = %args.file.display(), "Loaded results");

    let started_at = attempts
        .iter()
        .map(|a| a.timestamp())
        .min()
        .unwrap_or_else(chrono::Utc::now);
    let recorder = MetricsRecorder::replay(started_at, args.recent_window, attempts);
    let summary = FailoverSummary::from_recorder(
        &recorder,
        std::time::Duration::from_secs(args.sla_threshold_secs),
    );

    println!("{}", render_console(&summary));

    if let Some(format) = args.report {
        let dir = args
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        emit_report(dir, &summary, format.into());
    }

    Ok(())
}

fn emit_report(dir: &Path, summary: &FailoverSummary, format: ReportFormat) {
    match write_report(dir, summary, format) {
        Ok(path) => println!("📝 Report written to: {}", path.display()),
        Err(e) => error!(error = %e, "Failed to write report"),
    }
}

fn print_banner(config: &RunConfig, target: &str) {
    let rule = "=".repeat(80);
    println!("{}", rule);
    println!("DATABASE FAILOVER LOAD TEST");
    println!("{}", rule);
    println!("Target:              {}", target);
    println!("Workers:             {}", config.workers);
    println!("Writes per second:   {}", config.writes_per_second);
    println!("Duration:            {}s", config.duration_secs);
    println!("SLA threshold:       {}s", config.sla_threshold_secs);
    println!("Output directory:    {}", config.output_dir.display());
    println!("{}", rule);
    println!("\n📋 Planned failover instructions:");
    println!("  1. Wait until the first progress lines show a steady success rate");
    println!("  2. Trigger the failover, for example:");
    println!(
        "     az postgres flexible-server restart --resource-group <RG> --name <SERVER> --failover Planned"
    );
    println!("  3. Watch the progress lines for failures and the recovery");
    println!("  4. Let the run finish, or press Ctrl+C once writes succeed again");
    println!();
}

/// Raise `stop` on Ctrl+C or SIGTERM.
async fn stop_on_shutdown(stop: StopSignal) {
    shutdown_signal().await;
    stop.stop();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal, stopping workers");
        }
        _ = terminate => {
            info!("Received SIGTERM signal, stopping workers");
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
