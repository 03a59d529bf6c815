use colored::*;
use reqwest::Client;
use std::error::Error;

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl Metric {
    fn path(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
        }
    }
}

#[derive(Debug, PartialEq)]
struct Summary {
    count: usize,
    min: f32,
    avg: f32,
    max: f32,
    latest: f32,
}

pub async fn run_history(client: &Client, url: &str, metric: Metric) -> Result<(), Box<dyn Error>> {
    let samples: Vec<f32> = client
        .get(format!("{}/{}", url, metric.path()))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(summary) = summarize(&samples) else {
        println!("No {} samples yet.", metric.path());
        return Ok(());
    };

    println!("{} {}", metric.path().bold().cyan(), sparkline(&samples));
    println!(
        "  samples={} min={:.1}% avg={:.1}% max={:.1}% latest={:.1}%",
        summary.count, summary.min, summary.avg, summary.max, summary.latest
    );
    Ok(())
}

fn summarize(samples: &[f32]) -> Option<Summary> {
    let latest = *samples.last()?;
    let min = samples.iter().copied().fold(f32::INFINITY, f32::min);
    let max = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let avg = samples.iter().sum::<f32>() / samples.len() as f32;
    Some(Summary {
        count: samples.len(),
        min,
        avg,
        max,
        latest,
    })
}

fn sparkline(samples: &[f32]) -> String {
    samples
        .iter()
        .map(|v| {
            let idx = ((v.clamp(0.0, 100.0) / 100.0) * (SPARK.len() - 1) as f32).round() as usize;
            SPARK[idx.min(SPARK.len() - 1)]
        })
        .collect()
}
