//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use bellgrid_core::{
    DocumentOutcome, DocumentReport, IngestConfig, IngestReport, ProgressReporter, ingest,
    parse_file,
};
use bellgrid_fetch::FetchOptions;
use bellgrid_shared::{
    AppConfig, ExtractionMode, ScheduleConventions, ScheduleEntry, db_path, download_dir,
    init_config, load_config,
};
use bellgrid_storage::Storage;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Bellgrid: weekly class-schedule PDFs in, dated class periods out.
#[derive(Parser)]
#[command(
    name = "bellgrid",
    version,
    about = "Turn weekly class-schedule PDFs into dated class periods.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch every schedule PDF from the source and store its periods.
    Ingest {
        /// Page listing the schedule PDFs (defaults to `source.url` in config).
        url: Option<String>,

        /// Extraction mode: stream, layout, or auto.
        #[arg(short, long)]
        mode: Option<ExtractionMode>,

        /// Re-parse documents even if their content is unchanged.
        #[arg(long)]
        force: bool,

        /// Wipe stored entries before ingesting.
        #[arg(long)]
        clear: bool,

        /// Calendar year the academic year starts in.
        #[arg(long)]
        academic_year: Option<i32>,
    },

    /// Parse one local PDF and print its periods.
    Parse {
        /// Path to the schedule PDF.
        file: PathBuf,

        /// Document name carrying the week, e.g. "April 6th - 10th"
        /// (defaults to the file name).
        #[arg(short, long)]
        name: Option<String>,

        /// Extraction mode: stream, layout, or auto.
        #[arg(short, long)]
        mode: Option<ExtractionMode>,

        /// Calendar year the academic year starts in.
        #[arg(long)]
        academic_year: Option<i32>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List stored schedule entries.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Delete every stored entry and document record.
    Clear,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "bellgrid=info",
        1 => "bellgrid=debug",
        _ => "bellgrid=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    match cli.command {
        Command::Ingest {
            url,
            mode,
            force,
            clear,
            academic_year,
        } => cmd_ingest(url.as_deref(), mode, force, clear, academic_year).await,
        Command::Parse {
            file,
            name,
            mode,
            academic_year,
            json,
        } => cmd_parse(file, name, mode, academic_year, json).await,
        Command::List { json } => cmd_list(json).await,
        Command::Clear => cmd_clear().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Conventions from config, with an optional academic-year override.
fn conventions_for(config: &AppConfig, academic_year: Option<i32>) -> ScheduleConventions {
    let conventions = ScheduleConventions::from(config);
    match academic_year {
        Some(year) => conventions.with_academic_year(year),
        None => conventions,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    url: Option<&str>,
    mode: Option<ExtractionMode>,
    force: bool,
    clear: bool,
    academic_year: Option<i32>,
) -> Result<()> {
    let config = load_config()?;

    let url = url
        .or(config.source.url.as_deref())
        .ok_or_else(|| eyre!("no source URL: pass one or set `source.url` in the config file"))?;
    let source_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let ingest_config = IngestConfig {
        source_url,
        mode: mode.unwrap_or(config.defaults.mode),
        force,
        clear,
        download_dir: download_dir(&config)?,
        fetch: FetchOptions::from(&config.source),
        conventions: conventions_for(&config, academic_year),
    };

    info!(
        url,
        mode = %ingest_config.mode,
        force,
        clear,
        "ingesting schedules"
    );

    let storage = Storage::open(&db_path(&config)?).await?;
    let reporter = CliProgress::new();
    let report = ingest(&ingest_config, &storage, &reporter).await?;

    print_ingest_summary(&report);
    Ok(())
}

async fn cmd_parse(
    file: PathBuf,
    name: Option<String>,
    mode: Option<ExtractionMode>,
    academic_year: Option<i32>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let mode = mode.unwrap_or(config.defaults.mode);
    let conventions = conventions_for(&config, academic_year);

    info!(file = %file.display(), %mode, "parsing document");

    let parsed = tokio::task::spawn_blocking(move || {
        parse_file(&file, name.as_deref(), mode, &conventions)
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed.schedule.entries)?);
        return Ok(());
    }

    println!();
    println!("  Document: {}", parsed.schedule.name);
    println!("  Mode:     {}", parsed.mode);
    match (parsed.schedule.dates.as_slice().first(), parsed.schedule.dates.as_slice().last()) {
        (Some(first), Some(last)) => println!("  Week:     {first} to {last}"),
        _ => println!("  Week:     (name has no recognizable date range)"),
    }
    println!();
    print_entries(&parsed.schedule.entries);
    Ok(())
}

async fn cmd_list(json: bool) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open_readonly(&db_path(&config)?).await?;
    let entries = storage.get_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&entries);
    }
    Ok(())
}

async fn cmd_clear() -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&db_path(&config)?).await?;
    let removed = storage.clear_all().await?;
    println!("Removed {removed} entries.");
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_ingest_summary(report: &IngestReport) {
    println!();
    if let Some(cleared) = report.cleared {
        println!("  Cleared:   {cleared} entries");
    }
    println!("  Documents: {}", report.documents.len());
    println!("  Ingested:  {}", report.ingested());
    println!("  Unchanged: {}", report.unchanged());
    println!("  Failed:    {}", report.failed());
    println!("  Entries:   {}", report.entries());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());

    for doc in &report.documents {
        if let DocumentOutcome::Failed { error } = &doc.outcome {
            println!("  ! {}: {error}", doc.name);
        }
    }
    println!();
}

fn print_entries(entries: &[ScheduleEntry]) {
    if entries.is_empty() {
        println!("No schedule entries.");
        return;
    }
    for entry in entries {
        println!("{}", entry_line(entry));
    }
}

fn entry_line(entry: &ScheduleEntry) -> String {
    format!(
        "{}  {:<10}  {}-{}",
        entry.start_time.format("%a %Y-%m-%d"),
        entry.name,
        entry.start_time.format("%H:%M"),
        entry.end_time.format("%H:%M"),
    )
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
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_started(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Reading [{current}/{total}] {name}"));
    }

    fn document_finished(&self, report: &DocumentReport) {
        let line = match &report.outcome {
            DocumentOutcome::Ingested { entries, mode } => {
                format!("  {} ({entries} entries, {mode})", report.name)
            }
            DocumentOutcome::Unchanged => format!("  {} (unchanged)", report.name),
            DocumentOutcome::Failed { .. } => format!("  {} (failed)", report.name),
        };
        self.spinner.println(line);
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}
