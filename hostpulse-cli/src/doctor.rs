use colored::*;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;

#[derive(Deserialize, Debug)]
struct HealthResponse {
    #[allow(dead_code)]
    status: String,
}

#[derive(Deserialize, Debug)]
struct StatusResponse {
    version: String,
    server_name: String,
    public_ip: String,
    mounts: Vec<String>,
    uptime_s: u64,
    ticks: u64,
    alerts_sent: u64,
    alerts_failed: u64,
    alerts_suppressed: u64,
    alerts_dropped: u64,
    mounts_skipped: u64,
}

pub async fn run_doctor(url: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", "🩺 Hostpulse Doctor".bold().cyan());
    println!("{}", "Checking agent health...".dimmed());
    println!();

    let client = Client::new();
    let mut all_good = true;

    print!("• Agent Connectivity: ");
    match client.get(format!("{}/healthz", url)).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                if resp.json::<HealthResponse>().await.is_ok() {
                    println!("{}", "OK".green());
                } else {
                    println!("{}", "OK (Invalid JSON)".yellow());
                }
            } else {
                println!("{}", format!("FAIL (Status {})", resp.status()).red());
                all_good = false;
            }
        }
        Err(e) => {
            println!("{}", format!("FAIL ({})", e).red());
            println!("  → Is hostpulsed running? Try 'systemctl status hostpulsed'");
            return Ok(());
        }
    }

    print!("• Agent Status:       ");
    let status: StatusResponse = match client.get(format!("{}/status", url)).send().await {
        Ok(resp) => match resp.json().await {
            Ok(status) => status,
            Err(e) => {
                println!("{}", format!("FAIL ({})", e).red());
                return Ok(());
            }
        },
        Err(e) => {
            println!("{}", format!("FAIL ({})", e).red());
            return Ok(());
        }
    };
    println!(
        "{}",
        format!("OK (v{}, {} @ {})", status.version, status.server_name, status.public_ip).green()
    );

    print!("• Uptime:             ");
    if status.uptime_s < 60 {
        println!("{}", format!("{}s (Just started)", status.uptime_s).yellow());
    } else {
        println!("{}", format!("{}s", status.uptime_s).green());
    }

    print!("• Sampling:           ");
    if status.ticks > 0 {
        println!("{}", format!("{} ticks", status.ticks).green());
    } else {
        println!("{}", "No completed ticks yet".yellow());
    }

    print!("• Watched Mounts:     ");
    if status.mounts.is_empty() {
        println!("{}", "none".dimmed());
    } else {
        println!("{}", status.mounts.join(", ").green());
    }

    print!("• Skipped Mounts:     ");
    if status.mounts_skipped > 0 {
        println!(
            "{}",
            format!("{} (unmounted or unreadable)", status.mounts_skipped).yellow()
        );
    } else {
        println!("{}", "0".green());
    }

    print!("• Alert Delivery:     ");
    if status.alerts_failed > 0 {
        println!(
            "{}",
            format!(
                "Failing ({} sent, {} failed)",
                status.alerts_sent, status.alerts_failed
            )
            .red()
        );
        println!("  → Check the [smtp] section of hostpulse.toml.");
        all_good = false;
    } else if status.alerts_sent > 0 {
        println!("{}", format!("Active ({} sent)", status.alerts_sent).green());
    } else {
        println!("{}", "Idle".dimmed());
    }

    print!("• Suppressed/Dropped: ");
    let quiet = format!("{} / {}", status.alerts_suppressed, status.alerts_dropped);
    if status.alerts_dropped > 0 {
        println!("{}", quiet.yellow());
    } else {
        println!("{}", quiet.green());
    }

    println!();
    if all_good {
        println!("{}", "✅ Agent is healthy.".bold().green());
    } else {
        println!("{}", "⚠️  Agent has issues. See above.".bold().yellow());
    }

    Ok(())
}
