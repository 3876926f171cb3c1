use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use scout_client::exporters::{EventStore, OutputFormat};
use scout_client::runs::render;
use scout_client::{ConfigLoader, ScoutConfig, SnapshotRun, WorkflowOptions, WorkflowOutput, WorkflowRun};
use scout_common::{Event, WorkflowEvent};
use tracing::error;

use crate::commands::{Cli, Commands, EventFileKind};
use crate::logging::setup_logging;

fn output_format(csv: bool) -> OutputFormat {
    if csv {
        OutputFormat::Csv
    } else {
        OutputFormat::Json
    }
}

pub fn process_cli() -> Result<()> {
    let cli = Cli::parse();
    // Use the --config flag, if provided, when loading the configuration
    let config = ConfigLoader::load_config(cli.config.as_deref())?;
    setup_logging(&config.log_dir, cli.debug)?;

    let result = run_command(cli.command, config);
    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

fn run_command(command: Commands, config: ScoutConfig) -> Result<()> {
    match command {
        Commands::Snapshot => {
            let summary = tokio::runtime::Runtime::new()?
                .block_on(async {
                    let run = SnapshotRun::from_config(config)?;
                    run.execute(Utc::now()).await
                })
                .context("snapshot run failed")?;
            println!(
                "{} events written ({} sources collected, {} failed)",
                summary.events_written, summary.sources_succeeded, summary.sources_failed
            );
        }
        Commands::Workflows {
            csv,
            recent,
            stdout,
            logfiles,
        } => {
            let options = WorkflowOptions::builder()
                .files(logfiles)
                .format(output_format(csv))
                .recent(recent)
                .to_stdout(stdout)
                .build();
            match WorkflowRun::new(config)
                .execute(&options, Utc::now())
                .context("workflow run failed")?
            {
                WorkflowOutput::Rendered(text) => print!("{text}"),
                WorkflowOutput::Appended(files) => {
                    for file in files {
                        println!("updated {}", file.display());
                    }
                }
            }
        }
        Commands::Show {
            kind,
            year,
            month,
            csv,
        } => {
            let format = output_format(csv);
            let text = match kind {
                EventFileKind::State => {
                    let events = EventStore::<Event>::new(&config.output_dir).read(year, month, format)?;
                    render(&events, format)?
                }
                EventFileKind::Workflow => {
                    let events =
                        EventStore::<WorkflowEvent>::new(&config.output_dir).read(year, month, format)?;
                    render(&events, format)?
                }
            };
            print!("{text}");
            if format == OutputFormat::Json {
                println!();
            }
        }
    }
    Ok(())
}
