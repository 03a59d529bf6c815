use anyhow::{Context, Result, bail};
use log::info;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hostpulse/hostpulse.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Display name used in alert subjects.
    pub name: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Endpoint returning the host's public address as plain text. Empty
    /// disables the lookup.
    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

impl SmtpConfig {
    pub fn sender_address(&self) -> String {
        self.sender
            .clone()
            .unwrap_or_else(|| format!("Alert <{}>", self.username))
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Utilization (percent) above which a metric is in breach.
    pub threshold: f32,
    pub cooldown_secs: u64,
    pub history_capacity: usize,
    pub interval_secs: u64,
    /// Blocking CPU measurement window per tick.
    pub cpu_window_ms: u64,
    pub top_k: usize,
    /// Gate disk alerts through the cooldown tracker as well.
    pub unify_disk_cooldown: bool,
    pub mounts: Vec<MountConfig>,
}

impl MonitorConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            cooldown_secs: 300,
            history_capacity: 60,
            interval_secs: 5,
            cpu_window_ms: 1000,
            top_k: 5,
            unify_disk_cooldown: false,
            mounts: vec![MountConfig {
                path: "/".to_string(),
                device: "/dev/vda1".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    pub path: String,
    pub device: String,
}

fn default_listen() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_public_ip_url() -> String {
    "https://ipinfo.io/ip".to_string()
}

fn default_smtp_timeout() -> u64 {
    30
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg = Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config {}", path.display()))?;
        info!(
            "[config] loaded {} ({} mount(s), threshold {:.1}%)",
            path.display(),
            cfg.monitor.mounts.len(),
            cfg.monitor.threshold
        );
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(raw).context("failed to parse TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.name.trim().is_empty() {
            bail!("server.name must not be empty");
        }
        self.listen_addr()?;

        let smtp = &self.smtp;
        if smtp.server.trim().is_empty() {
            bail!("smtp.server must not be empty");
        }
        if smtp.port == 0 {
            bail!("smtp.port must not be 0");
        }
        if smtp.username.trim().is_empty() {
            bail!("smtp.username must not be empty");
        }
        if smtp.recipients.iter().all(|r| r.trim().is_empty()) {
            bail!("smtp.recipients must list at least one address");
        }

        let monitor = &self.monitor;
        if !(monitor.threshold > 0.0 && monitor.threshold <= 100.0) {
            bail!(
                "monitor.threshold must be within (0, 100], got {}",
                monitor.threshold
            );
        }
        if monitor.history_capacity == 0 {
            bail!("monitor.history_capacity must be at least 1");
        }
        if monitor.interval_secs == 0 {
            bail!("monitor.interval_secs must be at least 1");
        }
        if monitor.top_k == 0 {
            bail!("monitor.top_k must be at least 1");
        }
        let mut seen = HashSet::new();
        for mount in &monitor.mounts {
            if mount.path.trim().is_empty() {
                bail!("monitor.mounts entries need a path");
            }
            if !seen.insert(mount.path.as_str()) {
                bail!("monitor.mounts lists {} more than once", mount.path);
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .with_context(|| format!("server.listen {:?} is not host:port", self.server.listen))
    }
}

/// Config path from the command line, then the environment, then the
/// packaged default.
pub fn resolve_path(cli: Option<PathBuf>) -> PathBuf {
    cli.or_else(|| std::env::var_os("HOSTPULSE_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
