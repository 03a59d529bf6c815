use crate::config::{MonitorConfig, MountConfig};
use crate::cooldown::CooldownTracker;
use crate::history::HistoryBuffer;
use crate::types::MetricKey;
use std::collections::BTreeMap;

/// A configured mount and its rolling history.
pub struct DiskSeries {
    pub mount: MountConfig,
    pub history: HistoryBuffer,
}

/// Monitoring state shared by the sampling loop (sole writer) and the
/// HTTP handlers (readers). Every series has its own lock; the metric key
/// set is fixed at construction.
pub struct MonitorState {
    pub cpu: HistoryBuffer,
    pub memory: HistoryBuffer,
    pub disks: Vec<DiskSeries>,
    pub cooldown: CooldownTracker,
}

impl MonitorState {
    pub fn new(cfg: &MonitorConfig) -> Self {
        let capacity = cfg.history_capacity;
        Self {
            cpu: HistoryBuffer::new(capacity),
            memory: HistoryBuffer::new(capacity),
            disks: cfg
                .mounts
                .iter()
                .map(|mount| DiskSeries {
                    mount: mount.clone(),
                    history: HistoryBuffer::new(capacity),
                })
                .collect(),
            cooldown: CooldownTracker::new(cfg.cooldown()),
        }
    }

    pub fn history(&self, key: &MetricKey) -> Option<&HistoryBuffer> {
        match key {
            MetricKey::Cpu => Some(&self.cpu),
            MetricKey::Memory => Some(&self.memory),
            MetricKey::Disk(path) => self
                .disks
                .iter()
                .find(|d| &d.mount.path == path)
                .map(|d| &d.history),
        }
    }

    /// The first configured mount stands in for "the disk".
    pub fn primary_disk(&self) -> Option<&DiskSeries> {
        self.disks.first()
    }

    pub fn disk_snapshots(&self) -> BTreeMap<String, Vec<f32>> {
        self.disks
            .iter()
            .map(|d| (d.mount.path.clone(), d.history.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_mounts() -> MonitorConfig {
        MonitorConfig {
            history_capacity: 3,
            mounts: vec![
                MountConfig {
                    path: "/".to_string(),
                    device: "/dev/vda1".to_string(),
                },
                MountConfig {
                    path: "/data".to_string(),
                    device: "/dev/sda".to_string(),
                },
            ],
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn one_series_per_configured_mount() {
        let state = MonitorState::new(&two_mounts());
        assert_eq!(state.disks.len(), 2);
        assert_eq!(state.primary_disk().unwrap().mount.path, "/");
        assert!(state.history(&MetricKey::disk("/data")).is_some());
        assert!(state.history(&MetricKey::disk("/elsewhere")).is_none());
    }

    #[test]
    fn series_are_independent_and_bounded() {
        let state = MonitorState::new(&two_mounts());
        for v in [1.0, 2.0, 3.0, 4.0] {
            state.cpu.append(v);
        }
        state.history(&MetricKey::disk("/data")).unwrap().append(70.0);

        assert_eq!(state.cpu.snapshot(), vec![2.0, 3.0, 4.0]);
        assert!(state.memory.is_empty());
        let disks = state.disk_snapshots();
        assert_eq!(disks["/"], Vec::<f32>::new());
        assert_eq!(disks["/data"], vec![70.0]);
    }
}
