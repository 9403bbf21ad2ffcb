//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use eventgraph_core::{
    AnalyticsAggregator, Counters, PeriodStatus, ProgressReporter, RunConfig, RunSummary,
    merge_dataset,
};
use eventgraph_shared::{
    AppConfig, DayRange, Period, YearMonth, init_config, load_config, load_config_from,
};
use eventgraph_storage::CacheStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// EventGraph: turn the current-events portal into linked-data graphs.
#[derive(Parser)]
#[command(
    name = "eventgraph",
    version,
    about = "Extract current events, enrich them and emit URI-aligned knowledge graphs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.eventgraph/eventgraph.toml).
    #[arg(long, global = true, env = "EVENTGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Month span plus optional day sub-range, shared by `run` and `merge`.
#[derive(clap::Args, Debug)]
pub(crate) struct SpanArgs {
    /// First month, as M/YYYY.
    #[arg(long)]
    pub start: YearMonth,

    /// Last month, as M/YYYY (defaults to --start).
    #[arg(long)]
    pub end: Option<YearMonth>,

    /// First day of the sub-range applied to every month.
    #[arg(long, default_value_t = 1)]
    pub from_day: u32,

    /// Last day of the sub-range applied to every month.
    #[arg(long, default_value_t = 31)]
    pub to_day: u32,
}

impl SpanArgs {
    fn end(&self) -> YearMonth {
        self.end.unwrap_or(self.start)
    }

    fn days(&self) -> Result<Option<DayRange>> {
        let days = DayRange::new(self.from_day, self.to_day)?;
        Ok((days != DayRange { start: 1, end: 31 }).then_some(days))
    }

    fn run_config(&self) -> Result<RunConfig> {
        Ok(RunConfig {
            days: self.days()?,
            ..RunConfig::months(self.start, self.end())
        })
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl, enrich and write graph artifacts for a span of months.
    Run {
        #[command(flatten)]
        span: SpanArgs,

        /// Print the range total instead of persisting monthly analytics.
        #[arg(long)]
        custom_analytics: bool,

        /// Re-parse periods whose artifacts already exist.
        #[arg(long)]
        force: bool,
    },

    /// Sum persisted monthly analytics over a date range.
    Analytics {
        /// First day, as YYYY-MM-DD.
        #[arg(long)]
        from: NaiveDate,

        /// Last day, as YYYY-MM-DD (defaults to the end of --from's month).
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Print the counters as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Merge already written periods into dataset_{type}.jsonld.
    Merge {
        #[command(flatten)]
        span: SpanArgs,
    },

    /// Cache inspection.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// Count cached responses per service.
    Stats,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "eventgraph=info",
        1 => "eventgraph=debug",
        _ => "eventgraph=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run {
            span,
            custom_analytics,
            force,
        } => cmd_run(&config, &span, custom_analytics, force).await,
        Command::Analytics { from, to, json } => cmd_analytics(&config, from, to, json),
        Command::Merge { span } => cmd_merge(&config, &span),
        Command::Cache { action } => match action {
            CacheAction::Stats => cmd_cache_stats(&config).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &AppConfig,
    span: &SpanArgs,
    custom_analytics: bool,
    force: bool,
) -> Result<()> {
    let run_config = RunConfig {
        custom_analytics,
        force,
        ..span.run_config()?
    };

    info!(
        start = %run_config.start,
        end = %run_config.end,
        days = ?run_config.days,
        custom_analytics,
        force,
        "starting extraction"
    );

    let reporter = CliProgress::new();
    let summary = eventgraph_core::run(config, &run_config, &reporter).await?;

    println!();
    println!("  Run {}", summary.run_id);
    for outcome in &summary.outcomes {
        let status = match &outcome.status {
            PeriodStatus::Written { artifacts } => {
                format!("written ({} artifacts)", artifacts.len())
            }
            PeriodStatus::Skipped => "skipped (artifacts exist)".to_string(),
            PeriodStatus::Failed { reason } => format!("failed: {reason}"),
        };
        println!("  {:<24} {status}", outcome.period.prefix());
    }
    println!();
    print_counters(&summary.total);
    println!("  Output:  {}", config.output.dataset_dir.display());
    println!("  Time:    {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    let failed = summary
        .outcomes
        .iter()
        .filter(|o| matches!(o.status, PeriodStatus::Failed { .. }))
        .count();
    if failed > 0 {
        return Err(eyre!("{failed} period(s) failed"));
    }
    Ok(())
}

fn cmd_analytics(
    config: &AppConfig,
    from: NaiveDate,
    to: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let to = match to {
        Some(to) => to,
        None => {
            let last = YearMonth::of(from).days_in_month();
            from.with_day(last)
                .ok_or_else(|| eyre!("no day {last} in the month of {from}"))?
        }
    };
    if from > to {
        return Err(eyre!("--from {from} is after --to {to}"));
    }
    let aggregator = AnalyticsAggregator::load_range(
        &config.output.analytics_dir,
        YearMonth::of(from),
        YearMonth::of(to),
    )?;
    let total = aggregator.sum_range(from, to);

    if json {
        println!("{}", serde_json::to_string_pretty(&total)?);
        return Ok(());
    }

    let months = aggregator.records().count();
    println!();
    println!("  Analytics {from} .. {to} ({months} month(s) on record)");
    print_counters(&total);
    println!();
    Ok(())
}

fn cmd_merge(config: &AppConfig, span: &SpanArgs) -> Result<()> {
    let run_config = span.run_config()?;
    info!(start = %run_config.start, end = %run_config.end, "merging dataset");
    let artifacts = merge_dataset(config, &run_config)?;

    println!();
    for artifact in &artifacts {
        println!("  {:<24} {} bytes", artifact.filename, artifact.size_bytes);
    }
    println!("  Output:  {}", config.output.dataset_dir.display());
    println!();
    Ok(())
}

async fn cmd_cache_stats(config: &AppConfig) -> Result<()> {
    let cache = CacheStore::open(&config.output.cache_path).await?;
    println!();
    println!("  Cache: {}", config.output.cache_path.display());
    for service in ["portal", "kb_lookup", "disambiguation", "one_hop", "geocoding"] {
        println!("  {service:<16} {}", cache.count(Some(service)).await?);
    }
    println!("  {:<16} {}", "total", cache.count(None).await?);
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_counters(c: &Counters) {
    println!("  Events:              {}", c.events);
    println!(
        "  Entities resolved:   {} ({} failed)",
        c.entities_resolved, c.resolution_failures
    );
    println!(
        "  Locations geocoded:  {} ({} failed)",
        c.locations_geocoded, c.geocoding_failures
    );
    println!(
        "  One-hop facts:       {} ({} entities failed)",
        c.one_hop_facts, c.one_hop_failures
    );
    println!("  Failed days:         {}", c.day_failures);
    println!(
        "  Requests:            {} ({} cache hits)",
        c.external_requests, c.cache_hits
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn period_started(&self, period: &Period, current: usize, total: usize) {
        self.spinner.set_prefix(format!("[{current}/{total}] {period}"));
    }

    fn day_done(&self, date: NaiveDate, events: usize, failed: bool) {
        if failed {
            self.spinner.set_message(format!("{date}: page unavailable"));
        } else {
            self.spinner.set_message(format!("{date}: {events} events"));
        }
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
