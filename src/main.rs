use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use recruitment_analytics::aggregate::durations::stage_duration_metrics;
use recruitment_analytics::aggregate::funnel::{cohort_year_breakdown, funnel_counts, year_over_year};
use recruitment_analytics::aggregate::rates::{group_rate_averages, grouped_rate_metrics, key_metrics};
use recruitment_analytics::aggregate::report::{build_report_from_timeline, ReportOptions};
use recruitment_analytics::aggregate::roles::RoleTypeTable;
use recruitment_analytics::aggregate::seasonality::{available_years, monthly_seasonality};
use recruitment_analytics::aggregate::timeline::{build_timeline, CandidateTimeline};
use recruitment_analytics::aggregate::GroupKey;
use recruitment_analytics::config::{Config, ConfigOverrides};
use recruitment_analytics::dataset::fetcher::{provider_for, SheetPair};
use recruitment_analytics::dataset::{load_dataset, Dataset, Stage};
use recruitment_analytics::output::csv::{
    cohorts_to_csv, durations_to_csv, funnel_to_csv, quality_to_csv, rates_to_csv,
    seasonality_to_csv, summary_to_csv,
};
use recruitment_analytics::output::json::render_json;
use recruitment_analytics::output::table::{
    render_cohort_table, render_durations_table, render_funnel_table, render_quality_table,
    render_rates_table, render_report, render_seasonality_table, render_summary_table,
};
use recruitment_analytics::server::run_server;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "recruitment-analytics",
    about = "Funnel, cohort and seasonality reporting over recruiting sheets"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Candidate sheet: CSV path or http(s) URL.
    #[arg(long)]
    candidates: Option<String>,
    /// Activity sheet: CSV path or http(s) URL.
    #[arg(long)]
    activity: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Summary,
    Funnel,
    Cohorts,
    Sources,
    Positions,
    Process {
        #[arg(long, default_value = "application_source")]
        by: String,
    },
    Seasonality {
        #[arg(long)]
        year: Option<i32>,
    },
    Quality,
    Report,
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        candidates: cli.candidates.clone(),
        activity: cli.activity.clone(),
        seasonality_year: match &cli.command {
            Commands::Seasonality { year } => *year,
            _ => None,
        },
    });

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        return run_server(config, addr).await;
    }

    let roles = config.roles.table();
    let dataset = load_sheets(&config).await?;
    let timeline = build_timeline(&dataset.candidates, &dataset.events);

    match &cli.command {
        Commands::Summary => {
            let metrics = key_metrics(&timeline);
            print_section(&metrics, cli.output, render_summary_table, summary_to_csv)?;
        }
        Commands::Funnel => {
            let funnel = funnel_counts(&timeline);
            print_section(&funnel, cli.output, render_funnel_table, funnel_to_csv)?;
        }
        Commands::Cohorts => {
            let table = cohort_year_breakdown(&timeline, &Stage::FUNNEL)?;
            let comparisons = year_over_year(&table);
            match cli.output {
                OutputFormat::Table => println!("{}", render_cohort_table(&table, &comparisons)),
                OutputFormat::Json => println!(
                    "{}",
                    render_json(&serde_json::json!({
                        "table": table,
                        "year_over_year": comparisons,
                    }))?
                ),
                OutputFormat::Csv => println!("{}", cohorts_to_csv(&table)?),
            }
        }
        Commands::Sources => print_rates(&timeline, GroupKey::ApplicationSource, &roles, cli.output)?,
        Commands::Positions => print_rates(&timeline, GroupKey::PositionTitle, &roles, cli.output)?,
        Commands::Process { by } => {
            let key = GroupKey::from_str(by)?;
            let durations = stage_duration_metrics(&timeline, key, &roles)?;
            print_section(&durations, cli.output, render_durations_table, durations_to_csv)?;
        }
        Commands::Seasonality { .. } => {
            let year = config
                .report
                .seasonality_year
                .or_else(|| available_years(&timeline).last().copied())
                .ok_or_else(|| anyhow!("no application dates found; cannot pick a year"))?;
            let seasonality = monthly_seasonality(&timeline, year)?;
            if seasonality.months.is_empty() {
                warn!("no applications found for {year}");
            }
            print_section(&seasonality, cli.output, render_seasonality_table, seasonality_to_csv)?;
        }
        Commands::Quality => {
            let report =
                build_report_from_timeline(&dataset, &timeline, &report_options(&config), &roles)?;
            print_section(&report.quality, cli.output, render_quality_table, quality_to_csv)?;
        }
        Commands::Report => {
            let report =
                build_report_from_timeline(&dataset, &timeline, &report_options(&config), &roles)?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_report(&report)),
                OutputFormat::Json => println!("{}", render_json(&report)?),
                OutputFormat::Csv => {
                    warn!("CSV output for report not implemented, using JSON");
                    println!("{}", render_json(&report)?);
                }
            }
        }
        Commands::Config { .. } => {}
        Commands::Serve { .. } => unreachable!("serve command handled before dispatch"),
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &Path) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn report_options(config: &Config) -> ReportOptions {
    ReportOptions {
        seasonality_year: config.report.seasonality_year,
    }
}

async fn load_sheets(config: &Config) -> Result<Dataset> {
    let sheets = SheetPair::new(
        provider_for(&config.data.candidates, &config.http)?,
        provider_for(&config.data.activity, &config.http)?,
    );
    let raw = sheets.fetch().await?;
    let dataset = load_dataset(&raw)?;
    info!(
        candidates = dataset.candidates.len(),
        events = dataset.events.len(),
        warnings = dataset.quality.len(),
        "loaded sheets"
    );
    Ok(dataset)
}

fn print_section<T, R, C>(value: &T, format: OutputFormat, table: R, csv: C) -> Result<()>
where
    T: Serialize + ?Sized,
    R: Fn(&T) -> String,
    C: Fn(&T) -> Result<String>,
{
    match format {
        OutputFormat::Table => println!("{}", table(value)),
        OutputFormat::Json => println!("{}", render_json(value)?),
        OutputFormat::Csv => println!("{}", csv(value)?),
    }
    Ok(())
}

fn print_rates(
    timeline: &CandidateTimeline,
    key: GroupKey,
    roles: &RoleTypeTable,
    format: OutputFormat,
) -> Result<()> {
    let rows = grouped_rate_metrics(timeline, key, roles);
    let averages = group_rate_averages(&rows);
    match format {
        OutputFormat::Table => println!("{}", render_rates_table(key, &rows, &averages)),
        OutputFormat::Json => println!(
            "{}",
            render_json(&serde_json::json!({
                "key": key,
                "groups": rows,
                "averages": averages,
            }))?
        ),
        OutputFormat::Csv => println!("{}", rates_to_csv(key, &rows)?),
    }
    Ok(())
}
