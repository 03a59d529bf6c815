use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;

mod doctor;
mod history;
mod info;
mod processes;

use processes::SortBy;

#[derive(clap::Parser, Debug)]
struct Args {
    /// Base URL of the hostpulsed service
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    url: String,

    /// Disable colorized output
    #[clap(long)]
    no_color: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List processes with their CPU and memory share
    Processes {
        /// Only show the N heaviest processes
        #[clap(long)]
        top: Option<usize>,
        /// Resource to rank by
        #[clap(long, value_enum, default_value = "cpu")]
        by: SortBy,
    },
    /// Show a one-shot system summary
    Info,
    /// Summarize the rolling history of a metric
    History {
        #[clap(value_enum)]
        metric: history::Metric,
    },
    /// Check agent health and alerting counters
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }
    let client = Client::new();
    let url = args.url.trim_end_matches('/');

    match args.command {
        Command::Processes { top, by } => processes::run_processes(&client, url, top, by).await?,
        Command::Info => info::run_info(&client, url).await?,
        Command::History { metric } => history::run_history(&client, url, metric).await?,
        Command::Doctor => doctor::run_doctor(url).await?,
    }
    Ok(())
}
