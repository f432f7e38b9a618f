use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use agprs::export::{self, ExportFormat};
use agprs::logging::{init_logging, LogLevel};
use agprs::{
    AmbulatoryProfileEngine, AnalyticsRequest, BatchAnalyzer, BatchConfig, BiomarkerType,
    EngineConfig, HourlyPercentileBuilder, PatientBiomarkerPayload, RangeConfigPayload, Reading,
};

/// agprs - Ambulatory Profile Analytics CLI
///
/// Turns summary statistics and hourly percentile curves from continuous
/// glucose or cortisol monitoring into a time-in-range report.
#[derive(Parser)]
#[command(name = "agprs")]
#[command(version)]
#[command(about = "Ambulatory profile analytics CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a report from a biomarker payload
    Analyze {
        /// Payload JSON (startAt, endAt, statistics, percentages)
        #[arg(short, long)]
        payload: PathBuf,

        /// Range configuration JSON from the range service
        #[arg(short, long)]
        ranges: Option<PathBuf>,

        /// Biomarker (glucose, cortisol)
        #[arg(short, long, default_value = "glucose")]
        biomarker: BiomarkerType,

        /// Detected patient condition (repeatable)
        #[arg(long = "condition")]
        conditions: Vec<String>,

        /// Output format (table, json)
        #[arg(short = 'f', long, default_value = "table")]
        format: ExportFormat,

        /// Write the JSON report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze many payloads in parallel, one JSON report per line
    Batch {
        /// Payload JSON files
        #[arg(required = true)]
        payloads: Vec<PathBuf>,

        /// Biomarker (glucose, cortisol)
        #[arg(short, long, default_value = "glucose")]
        biomarker: BiomarkerType,

        /// Worker threads (default: number of CPUs)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Compute hourly percentile curves from raw readings
    Percentiles {
        /// Readings JSON array (timestamp, value, sensorId)
        #[arg(short, long)]
        readings: PathBuf,

        /// Biomarker whose minimum-readings setting applies
        #[arg(short, long, default_value = "glucose")]
        biomarker: BiomarkerType,
    },

    /// Manage the range configuration file
    Config {
        /// Write the built-in defaults to the config path
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) if path.exists() => EngineConfig::load_from_file(path),
        Some(_) => Ok(EngineConfig::default()),
        None => Ok(EngineConfig::load_or_default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let mut log_config = config.logging.clone();
    if cli.verbose > 0 {
        log_config.level = LogLevel::from_verbosity(cli.verbose);
    }
    init_logging(&log_config)?;

    let config = config.install()?;
    let engine = AmbulatoryProfileEngine::new(config);

    match cli.command {
        Commands::Analyze {
            payload,
            ranges,
            biomarker,
            conditions,
            format,
            output,
        } => {
            let payload = PatientBiomarkerPayload::from_json_str(&read_file(&payload)?)?;
            let mut request = AnalyticsRequest::new(biomarker, payload).with_conditions(conditions);
            if let Some(path) = ranges {
                request = request.with_range_config(RangeConfigPayload::from_json_str(&read_file(&path)?)?);
            }

            let result = match engine.analyze(&request) {
                Ok(result) => result,
                Err(err) => {
                    if err.severity().to_tracing_level() == tracing::Level::ERROR {
                        tracing::error!(error = %err, "analysis rejected");
                    }
                    eprintln!("{} {}", "✗".red().bold(), err.user_message());
                    std::process::exit(1);
                }
            };

            if let Some(path) = output {
                export::export_json(&result, &path)?;
                println!("{} {}", "✓ Report written to".green(), path.display());
            } else {
                match format {
                    ExportFormat::Json => println!("{}", export::to_json_string(&result)?),
                    ExportFormat::Table => {
                        print!("{}", export::render_report(&result, &config.biomarker(biomarker).unit))
                    }
                }
            }
        }

        Commands::Batch {
            payloads,
            biomarker,
            threads,
        } => {
            let requests = payloads
                .iter()
                .map(|path| {
                    let payload = PatientBiomarkerPayload::from_json_str(&read_file(path)?)?;
                    Ok(AnalyticsRequest::new(biomarker, payload))
                })
                .collect::<Result<Vec<_>>>()?;

            let analyzer = BatchAnalyzer::with_config(engine, BatchConfig { num_threads: threads });
            let outcome = analyzer.analyze_all(&requests)?;

            for (path, result) in payloads.iter().zip(&outcome.results) {
                match result {
                    Ok(report) => println!("{}", serde_json::to_string(report)?),
                    Err(err) => eprintln!("{} {}: {}", "✗".red(), path.display(), err.user_message()),
                }
            }
            eprintln!(
                "{}",
                format!(
                    "{} succeeded, {} failed in {}ms",
                    outcome.succeeded(),
                    outcome.failed(),
                    outcome.duration_ms
                )
                .dimmed()
            );
        }

        Commands::Percentiles { readings, biomarker } => {
            let readings: Vec<Reading> = serde_json::from_str(&read_file(&readings)?)
                .with_context(|| "Failed to parse readings")?;
            let curve = HourlyPercentileBuilder::from_config(config.biomarker(biomarker)).build(&readings);
            println!("{}", export::to_json_string(&curve)?);
        }

        Commands::Config { init, show } => {
            let path = cli.config.unwrap_or_else(EngineConfig::default_config_path);
            if init {
                EngineConfig::default().save_to_file(&path)?;
                println!("{} {}", "✓ Default configuration written to".green(), path.display());
            }
            if show || !init {
                println!("{}", format!("# {}", path.display()).dimmed());
                println!("{}", toml::to_string_pretty(config)?);
            }
        }
    }

    Ok(())
}
