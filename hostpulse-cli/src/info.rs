use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct SystemInfo {
    cpu_count: usize,
    cpu_usage: f64,
    free_cpu: f64,
    total_memory: f64,
    free_memory: f64,
    memory_usage: f64,
    total_disk: f64,
    free_disk: f64,
    disk_usage: f64,
}

pub async fn run_info(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let info: SystemInfo = client
        .get(format!("{}/system_info", url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("{}", "System Info".bold().cyan());
    println!(
        "  CPU:    {} cores, {} used ({:.1}% free)",
        info.cpu_count,
        pct(info.cpu_usage),
        info.free_cpu
    );
    println!(
        "  Memory: {} used, {:.0} MB free of {:.0} MB",
        pct(info.memory_usage),
        info.free_memory,
        info.total_memory
    );
    println!(
        "  Disk /: {} used, {:.1} GB free of {:.1} GB",
        pct(info.disk_usage),
        info.free_disk,
        info.total_disk
    );
    Ok(())
}

fn pct(value: f64) -> ColoredString {
    let text = format!("{:.1}%", value);
    if value > 90.0 {
        text.red().bold()
    } else {
        text.green()
    }
}
