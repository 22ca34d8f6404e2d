//! Command-line runner for the sensor-guard pipeline.
//!
//! Streams every CSV under the data directory through detection and the
//! rule-based decision loop, then prints the run statistics as JSON.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use sensor_guard::error::Result;
use sensor_guard::logging::setup::{init_logging, LoggingConfig};
use sensor_guard::prelude::*;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory scanned recursively for sensor CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON pipeline configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON sensor mapping; without it sensors are discovered from file headers
    #[arg(long)]
    sensor_map: Option<PathBuf>,

    /// Pause between emitted events, in milliseconds
    #[arg(long)]
    delay_ms: Option<f64>,

    /// Buffered anomalies needed before a decision cycle runs
    #[arg(long)]
    trigger: Option<usize>,

    /// Append every decision cycle to this JSON Lines file
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Debug logging plus per-event and per-decision log lines
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(data_dir) = &self.data_dir {
            config = config.with_data_dir(data_dir);
        }
        if let Some(delay_ms) = self.delay_ms {
            config.emit_delay_ms = delay_ms;
        }
        if let Some(trigger) = self.trigger {
            config.decision.trigger = trigger;
        }
        if let Some(journal) = &self.journal {
            config.decision.journal_path = Some(journal.clone());
        }
        // Rejects delays that are negative or too large for a Duration.
        config.validate()?;
        Ok(config)
    }

    fn logging_config(&self) -> LoggingConfig {
        let config = if self.verbose {
            LoggingConfig::development()
        } else {
            LoggingConfig::default()
        };
        config.with_json_format(self.json_logs)
    }
}

async fn run(args: &Args) -> Result<PipelineStats> {
    let config = args.pipeline_config()?;
    let registry = match &args.sensor_map {
        Some(path) => SensorRegistry::from_json_file(path)?,
        None => SensorRegistry::discover(&config.data_dir, &config.resolver(), &config.ingest)?,
    };
    info!(sensors = registry.len(), "Sensor registry ready");

    let log_config = if args.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    Pipeline::new(config, registry)?
        .with_log_config(log_config)
        .run()
        .await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.logging_config()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(&args).await {
        Ok(stats) => match serde_json::to_string_pretty(&stats) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "Failed to serialize run statistics");
                process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "Pipeline run failed");
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
