pub mod alert;
pub mod api;
pub mod config;
pub mod cooldown;
pub mod history;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod public_ip;
pub mod ranker;
pub mod source;
pub mod state;
pub mod types;
pub mod ui;

#[cfg(test)]
mod testing;

pub use config::{Config, MonitorConfig, MountConfig, ServerConfig, SmtpConfig};
pub use cooldown::CooldownTracker;
pub use history::HistoryBuffer;
pub use metrics::Metrics;
pub use monitor::Sampler;
pub use state::MonitorState;
