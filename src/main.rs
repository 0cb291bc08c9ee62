// Import from library crate
use misship_report::config::ReportConfig;
use misship_report::export::export_clean_csv;
use misship_report::normalize::BlameLabel;
use misship_report::pipeline::{load_inputs, Inputs};
use misship_report::report::{render_daily_text, render_trend_text, ReportBuilder};
use misship_report::schema;
use misship_report::source::{source_for, FallbackSource, TableSource};

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "misship-report")]
#[command(about = "Mis-ship and missing-unit rates from fulfillment event logs")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs)]
struct SourceArgs {
    /// Fulfillment log CSV or XLSX (path or http(s) URL); repeat to add fallbacks tried in order
    #[arg(short, long = "input", required = true)]
    inputs: Vec<String>,

    /// Reference sheet of authoritative daily unit totals (path or URL)
    #[arg(short, long)]
    totals: Option<String>,

    /// JSON report config (targets, status/blame sets)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mis-ship target rate as a fraction (overrides config and env)
    #[arg(long)]
    mis_ship_target: Option<f64>,

    /// Missing-unit target rate as a fraction (overrides config and env)
    #[arg(long)]
    missing_target: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline rates, what-if and drill-downs for one day
    Report {
        #[command(flatten)]
        source: SourceArgs,

        /// Day to report (YYYY-MM-DD); defaults to the latest day in the log
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Additional blame categories to exclude in a what-if simulation
        #[arg(long = "exclude-blame")]
        exclude_blames: Vec<String>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Daily rates across every date in the log
    Trend {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Write the normalized table as UTF-8 CSV with byte-order marker
    Export {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file
        #[arg(short, long, default_value = "data_clean.csv")]
        output: PathBuf,
    },
    /// Check that the log has every required field and readable dates
    Validate {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Report {
            source,
            date,
            exclude_blames,
            format,
        } => run_report(source, date, exclude_blames, format).await,
        Commands::Trend { source, format } => run_trend(source, format).await,
        Commands::Export { source, output } => run_export(source, output).await,
        Commands::Validate { source } => run_validate(source).await,
    }
}

fn build_config(source: &SourceArgs) -> Result<ReportConfig> {
    let config = match &source.config {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    }
    .with_env_overrides()?
    .with_target_overrides(source.mis_ship_target, source.missing_target)?;
    Ok(config)
}

async fn load(source: &SourceArgs, config: &ReportConfig) -> Result<Inputs> {
    let log = FallbackSource::from_descriptors(&source.inputs)?;
    let totals: Option<Box<dyn TableSource>> = source.totals.as_deref().map(source_for).transpose()?;
    let inputs = load_inputs(&log, totals.as_deref(), config).await?;
    Ok(inputs)
}

async fn run_report(
    source: SourceArgs,
    date: Option<NaiveDate>,
    exclude_blames: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let config = build_config(&source)?;
    let inputs = load(&source, &config).await?;
    let excluded: Vec<BlameLabel> = exclude_blames.iter().map(|b| BlameLabel::normalize(b)).collect();

    let builder = ReportBuilder::new(&inputs.records, &inputs.totals, &config);
    let report = builder.daily(date, &excluded)?;

    match format {
        OutputFormat::Text => print!("{}", render_daily_text(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

async fn run_trend(source: SourceArgs, format: OutputFormat) -> Result<()> {
    let config = build_config(&source)?;
    let inputs = load(&source, &config).await?;

    let rows = ReportBuilder::new(&inputs.records, &inputs.totals, &config).trend();
    match format {
        OutputFormat::Text => print!("{}", render_trend_text(&rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

async fn run_export(source: SourceArgs, output: PathBuf) -> Result<()> {
    let config = build_config(&source)?;
    let inputs = load(&source, &config).await?;
    export_clean_csv(&inputs.records, &output)?;
    println!("{} records written to {}", inputs.records.len(), output.display());
    Ok(())
}

async fn run_validate(source: SourceArgs) -> Result<()> {
    let log = FallbackSource::from_descriptors(&source.inputs)?;
    let raw = log.load().await?;
    let validated = schema::validate(raw)?;
    let records = misship_report::record::RecordSet::from_validated(&validated)?;
    let dates = records.dates();

    info!("Validation passed for {}", log.describe());
    println!(
        "OK: {} rows, {} dates ({} .. {})",
        records.len(),
        dates.len(),
        dates.first().map(|d| d.to_string()).unwrap_or_default(),
        dates.last().map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(())
}
