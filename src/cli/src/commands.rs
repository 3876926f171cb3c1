use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Clone)]
#[clap(
    name = "scout",
    about = "Derives discrete events from service metrics and orchestration logs",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// TOML config file (defaults to /etc/scout/scout.toml when present)
    #[clap(long, global = true)]
    pub config: Option<String>,

    /// Debug logging on the console and in the log file
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scrape every deployment, compare with the last run and append the resulting events
    Snapshot,

    /// Correlate recovery workflows from orchestration logs (gzip or plain)
    Workflows {
        /// CSV output format (default is JSON)
        #[clap(long)]
        csv: bool,

        /// Only process log lines from the last `recent_days` days
        #[clap(long)]
        recent: bool,

        /// Print the workflows instead of appending them to the event files
        #[clap(long)]
        stdout: bool,

        /// Log files; the deployment is the file name up to the first underscore
        #[clap(required = true)]
        logfiles: Vec<PathBuf>,
    },

    /// Print the events stored for one month
    Show {
        #[clap(value_enum)]
        kind: EventFileKind,

        #[clap(long)]
        year: i32,

        #[clap(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,

        /// Read and print the CSV file instead of the JSON one
        #[clap(long)]
        csv: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFileKind {
    /// Metrics state events
    State,
    /// Recovery workflow events
    Workflow,
}
