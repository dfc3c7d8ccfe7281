use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use faildrill_core::{LoadTestResult, ReportFormat, RunConfig};
use faildrill_store::WriteTarget;

#[derive(Parser, Debug)]
#[command(name = "faildrill-loadtest")]
#[command(about = "Measure database unavailability during a planned failover", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive concurrent writes against PostgreSQL while a failover happens
    Run(RunArgs),

    /// Summarize a previously exported results CSV
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML file with run settings; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent writers
    #[arg(long, env = "FAILDRILL_WORKERS")]
    pub workers: Option<usize>,

    /// Aggregate target write rate across all workers
    #[arg(long, env = "FAILDRILL_WRITES_PER_SECOND")]
    pub writes_per_second: Option<f64>,

    /// Run length in seconds
    #[arg(long, env = "FAILDRILL_DURATION_SECS")]
    pub duration_secs: Option<u64>,

    /// Failover must finish in strictly less than this many seconds
    #[arg(long = "sla-secs", env = "FAILDRILL_SLA_SECS")]
    pub sla_threshold_secs: Option<u64>,

    /// Seconds between progress lines
    #[arg(long)]
    pub report_interval_secs: Option<u64>,

    /// Attempts used for the rolling success rate
    #[arg(long)]
    pub recent_window: Option<usize>,

    /// Per-write timeout in milliseconds
    #[arg(long)]
    pub write_timeout_ms: Option<u64>,

    /// Directory for the results CSV and report
    #[arg(long, env = "FAILDRILL_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write a summary report file
    #[arg(long, value_enum)]
    pub report: Option<ReportArg>,

    /// Exit with status 2 unless the failover was observed within the SLA
    #[arg(long)]
    pub fail_on_sla: bool,

    /// Table holding the reference keys
    #[arg(long, default_value = "cruise")]
    pub key_table: String,

    /// Key column of the reference table
    #[arg(long, default_value = "id")]
    pub key_column: String,

    /// Table receiving synthetic rows
    #[arg(long, default_value = "inforequest")]
    pub target_table: String,

    /// Column of the target table referencing the key column
    #[arg(long, default_value = "cruise_id")]
    pub target_key_column: String,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Results CSV written by `run`
    #[arg(long)]
    pub file: PathBuf,

    /// Failover must finish in strictly less than this many seconds
    #[arg(
        long = "sla-secs",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sla_threshold_secs: u64,

    /// Attempts used for the rolling success rate
    #[arg(long, default_value = "50", value_parser = parse_recent_window)]
    pub recent_window: usize,

    /// Also write a summary report file next to the CSV
    #[arg(long, value_enum)]
    pub report: Option<ReportArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportArg {
    Markdown,
    Json,
}

impl From<ReportArg> for ReportFormat {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Markdown => ReportFormat::Markdown,
            ReportArg::Json => ReportFormat::Json,
        }
    }
}

fn parse_recent_window(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(window) => Ok(window),
        Err(e) => Err(e.to_string()),
    }
}

impl RunArgs {
    /// Layer flags (and their environment fallbacks) over the config file, or
    /// over the defaults when no file is given.
    pub fn resolve_config(&self) -> LoadTestResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(rate) = self.writes_per_second {
            config.writes_per_second = rate;
        }
        if let Some(secs) = self.duration_secs {
            config.duration_secs = secs;
        }
        if let Some(secs) = self.sla_threshold_secs {
            config.sla_threshold_secs = secs;
        }
        if let Some(secs) = self.report_interval_secs {
            config.report_interval_secs = secs;
        }
        if let Some(window) = self.recent_window {
            config.recent_window = window;
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout_ms = ms;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn write_target(&self) -> WriteTarget {
        WriteTarget {
            key_table: self.key_table.clone(),
            key_column: self.key_column.clone(),
            target_table: self.target_table.clone(),
            target_key_column: self.target_key_column.clone(),
        }
    }
}
