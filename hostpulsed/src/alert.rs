//! Alert message construction.

use crate::types::{MetricKey, ProcessRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub key: MetricKey,
    pub subject: String,
    pub body: String,
}

/// Identity of the reporting host, baked into every subject line.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub server_name: String,
    pub public_ip: String,
}

impl HostIdentity {
    fn subject(&self, key: &MetricKey) -> String {
        format!(
            "🚨 {}: High {} Usage Alert on IP: {} 🚨",
            self.server_name,
            key.label(),
            self.public_ip
        )
    }
}

/// CPU or memory breach, attributed to the processes ranked by the same
/// resource.
pub fn resource_alert(
    host: &HostIdentity,
    key: MetricKey,
    usage: f32,
    top: &[ProcessRecord],
    at: DateTime<Utc>,
) -> Alert {
    let label = key.label();
    let mut body = format!("🔥 Current {label} Usage: {usage:.1}%\n\n");
    let _ = writeln!(body, "📊 Top Processes by {label} Usage:");
    if top.is_empty() {
        body.push_str("(no processes could be read)\n");
    }
    for record in top {
        let share = match key {
            MetricKey::Memory => record.memory_percent,
            _ => record.cpu_percent,
        };
        let _ = writeln!(
            body,
            "PID: {}, Name: {}, {}: {:.1}%",
            record.pid, record.name, label, share
        );
    }
    push_timestamp(&mut body, at);

    Alert {
        subject: host.subject(&key),
        key,
        body,
    }
}

pub fn disk_alert(
    host: &HostIdentity,
    mount: &str,
    device: &str,
    usage: f32,
    at: DateTime<Utc>,
) -> Alert {
    let key = MetricKey::disk(mount);
    let mut body = format!("🔥 Current Disk Usage: {usage:.1}% on {device} mounted on {mount}\n");
    push_timestamp(&mut body, at);
    Alert {
        subject: host.subject(&key),
        key,
        body,
    }
}

fn push_timestamp(body: &mut String, at: DateTime<Utc>) {
    let _ = write!(
        body,
        "\nObserved at {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
}
