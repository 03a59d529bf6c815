use colored::*;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::cmp::Ordering;
use std::error::Error;

#[derive(Debug, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    #[serde(deserialize_with = "share_or_zero")]
    pub cpu_percent: f32,
    #[serde(deserialize_with = "share_or_zero")]
    pub memory_percent: f32,
}

// serde_json writes NaN shares as null.
fn share_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortBy {
    Cpu,
    Memory,
}

impl SortBy {
    fn as_query(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }

    fn share(self, p: &ProcessInfo) -> f32 {
        match self {
            Self::Cpu => p.cpu_percent,
            Self::Memory => p.memory_percent,
        }
    }
}

pub async fn run_processes(
    client: &Client,
    url: &str,
    top: Option<usize>,
    by: SortBy,
) -> Result<(), Box<dyn Error>> {
    let endpoint = match top {
        Some(k) => format!("{}/processes/top?k={}&by={}", url, k, by.as_query()),
        None => format!("{}/processes", url),
    };
    let mut processes: Vec<ProcessInfo> = client
        .get(endpoint)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    sort_processes(&mut processes, by);

    if processes.is_empty() {
        println!("No processes reported.");
        return Ok(());
    }

    println!("{:<8} {:<7} {:<7} NAME", "PID", "CPU%", "MEM%");
    for p in processes {
        println!(
            "{:<8} {:<7} {:<7} {}",
            p.pid,
            shade(p.cpu_percent),
            shade(p.memory_percent),
            p.name
        );
    }

    Ok(())
}

fn sort_processes(processes: &mut [ProcessInfo], by: SortBy) {
    processes.sort_by(|a, b| {
        by.share(b)
            .partial_cmp(&by.share(a))
            .unwrap_or(Ordering::Equal)
    });
}

fn shade(value: f32) -> ColoredString {
    let text = format!("{:.1}", value);
    if value > 90.0 {
        text.red().bold()
    } else if value > 50.0 {
        text.yellow()
    } else {
        text.normal()
    }
}
