use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use std::net::IpAddr;
use std::time::Duration;

pub const UNKNOWN: &str = "unknown";
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Public address for alert subjects. Any failure degrades to `"unknown"`.
pub async fn resolve(url: &str, timeout: Duration) -> String {
    if url.trim().is_empty() {
        info!("[public-ip] lookup disabled");
        return UNKNOWN.to_string();
    }
    match fetch(url, timeout).await {
        Ok(ip) => {
            info!("[public-ip] {ip}");
            ip.to_string()
        }
        Err(err) => {
            warn!("[public-ip] lookup via {url} failed: {err:#}");
            UNKNOWN.to_string()
        }
    }
}

async fn fetch(url: &str, timeout: Duration) -> Result<IpAddr> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build reqwest client")?;
    let resp = client.get(url).send().await.context("request failed")?;
    if !resp.status().is_success() {
        return Err(anyhow!("lookup returned status {}", resp.status()));
    }
    let body = resp.text().await.context("failed to read body")?;
    parse_body(&body)
}

fn parse_body(body: &str) -> Result<IpAddr> {
    body.trim()
        .parse()
        .with_context(|| format!("not an IP address: {:?}", body.trim()))
}
