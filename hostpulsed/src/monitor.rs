//! The periodic sampling loop.
//!
//! Each tick samples CPU, then memory, then every configured mount, in
//! that order, appending to the matching history series and raising alerts
//! for readings above the threshold. CPU and memory alerts pass through the
//! cooldown tracker; disk alerts fire on every breaching tick unless
//! `unify_disk_cooldown` is set. A failed reading costs only that data
//! point; nothing in a tick can end the loop.

use crate::alert::{self, HostIdentity};
use crate::config::MonitorConfig;
use crate::metrics::Metrics;
use crate::notifier::AlertDispatcher;
use crate::ranker::{ProcessRanker, RankBy};
use crate::source::SnapshotSource;
use crate::state::{DiskSeries, MonitorState};
use crate::types::MetricKey;
use chrono::Utc;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

pub struct Sampler {
    cfg: MonitorConfig,
    state: Arc<MonitorState>,
    source: Arc<dyn SnapshotSource>,
    ranker: ProcessRanker,
    dispatcher: AlertDispatcher,
    metrics: Arc<Metrics>,
    host: HostIdentity,
}

impl Sampler {
    pub fn new(
        cfg: MonitorConfig,
        state: Arc<MonitorState>,
        source: Arc<dyn SnapshotSource>,
        dispatcher: AlertDispatcher,
        metrics: Arc<Metrics>,
        host: HostIdentity,
    ) -> Self {
        Self {
            ranker: ProcessRanker::new(Arc::clone(&source)),
            cfg,
            state,
            source,
            dispatcher,
            metrics,
            host,
        }
    }

    /// Runs ticks until `stop` turns true or its sender goes away. The
    /// signal is honored before each tick and during the inter-tick sleep.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(
            "[monitor] sampling every {}s (threshold {:.1}%, cooldown {}s, {} mount(s))",
            self.cfg.interval_secs,
            self.cfg.threshold,
            self.cfg.cooldown_secs,
            self.state.disks.len()
        );

        loop {
            if *stop.borrow() {
                break;
            }
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.interval()) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        info!("[monitor] sampling loop stopped");
    }

    pub async fn tick(&self) {
        self.sample_cpu().await;
        self.sample_memory().await;
        self.sample_disks().await;
        self.metrics.inc_ticks();
    }

    async fn sample_cpu(&self) {
        match self.source.cpu_percent(self.cfg.cpu_window()).await {
            Ok(usage) => {
                self.state.cpu.append(usage);
                self.check_resource(MetricKey::Cpu, usage, RankBy::Cpu).await;
            }
            Err(err) => warn!("[monitor] cpu sample skipped: {err}"),
        }
    }

    async fn sample_memory(&self) {
        match self.source.memory().await {
            Ok(stats) => {
                self.state.memory.append(stats.percent);
                self.check_resource(MetricKey::Memory, stats.percent, RankBy::Memory)
                    .await;
            }
            Err(err) => warn!("[monitor] memory sample skipped: {err}"),
        }
    }

    async fn check_resource(&self, key: MetricKey, usage: f32, by: RankBy) {
        if usage <= self.cfg.threshold {
            return;
        }
        if !self.state.cooldown.try_acquire(&key) {
            self.metrics.inc_alerts_suppressed();
            debug!("[monitor] {key} at {usage:.1}% suppressed by cooldown");
            return;
        }

        let top = self.ranker.top(self.cfg.top_k, by).await;
        let alert = alert::resource_alert(&self.host, key, usage, &top, Utc::now());
        warn!("[monitor] {} at {usage:.1}% exceeds {:.1}%", alert.key, self.cfg.threshold);
        self.dispatcher.dispatch(alert);
    }

    async fn sample_disks(&self) {
        for series in &self.state.disks {
            self.sample_disk(series).await;
        }
    }

    async fn sample_disk(&self, series: &DiskSeries) {
        let mount = &series.mount;
        let usage = match self.source.disk(Path::new(&mount.path)).await {
            Ok(stats) => stats.percent,
            Err(err) => {
                self.metrics.inc_mounts_skipped();
                warn!("[monitor] skipping mount {} this tick: {err}", mount.path);
                return;
            }
        };

        series.history.append(usage);
        if usage <= self.cfg.threshold {
            return;
        }
        if self.cfg.unify_disk_cooldown
            && !self.state.cooldown.try_acquire(&MetricKey::disk(&mount.path))
        {
            self.metrics.inc_alerts_suppressed();
            return;
        }

        let alert = alert::disk_alert(&self.host, &mount.path, &mount.device, usage, Utc::now());
        warn!(
            "[monitor] disk {} ({}) at {usage:.1}% exceeds {:.1}%",
            mount.path, mount.device, self.cfg.threshold
        );
        self.dispatcher.dispatch(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MountConfig;
    use crate::testing::{DiskScript, FakeSource, RecordingNotifier, proc};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    struct Harness {
        sampler: Sampler,
        source: Arc<FakeSource>,
        state: Arc<MonitorState>,
        metrics: Arc<Metrics>,
        notifier: Arc<RecordingNotifier>,
        worker: JoinHandle<()>,
    }

    impl Harness {
        fn new(cfg: MonitorConfig) -> Self {
            Self::with_notifier(cfg, RecordingNotifier::default())
        }

        fn with_notifier(cfg: MonitorConfig, notifier: RecordingNotifier) -> Self {
            let source = Arc::new(FakeSource::new());
            let state = Arc::new(MonitorState::new(&cfg));
            let metrics = Arc::new(Metrics::new());
            let notifier = Arc::new(notifier);
            let (dispatcher, worker) =
                AlertDispatcher::spawn(notifier.clone(), Arc::clone(&metrics), 64);
            let sampler = Sampler::new(
                cfg,
                Arc::clone(&state),
                source.clone(),
                dispatcher,
                Arc::clone(&metrics),
                HostIdentity {
                    server_name: "web-01".to_string(),
                    public_ip: "203.0.113.7".to_string(),
                },
            );
            Self {
                sampler,
                source,
                state,
                metrics,
                notifier,
                worker,
            }
        }

        async fn ticks(&self, n: usize) {
            for _ in 0..n {
                self.sampler.tick().await;
            }
        }

        /// Closes the dispatch queue and waits for every queued delivery.
        async fn finish(self) -> (Vec<(String, String)>, Arc<MonitorState>, Arc<Metrics>) {
            drop(self.sampler);
            self.worker.await.unwrap();
            (self.notifier.sent(), self.state, self.metrics)
        }
    }

    fn mounts(paths: &[(&str, &str)]) -> Vec<MountConfig> {
        paths
            .iter()
            .map(|(path, device)| MountConfig {
                path: path.to_string(),
                device: device.to_string(),
            })
            .collect()
    }

    fn quiet_source(source: &FakeSource) {
        source.push_memory(&[10.0]);
        source.set_disk("/", DiskScript::Usage(20.0));
    }

    #[tokio::test]
    async fn rapid_cpu_breaches_alert_once() {
        let h = Harness::new(MonitorConfig::default());
        quiet_source(&h.source);
        h.source.push_cpu(&[50.0, 95.0, 96.0, 97.0]);
        h.source.set_processes(vec![
            Ok(proc(1, "init", 0.1, 0.2)),
            Ok(proc(4242, "stress", 97.0, 1.0)),
        ]);

        h.ticks(4).await;
        let (sent, state, metrics) = h.finish().await;

        assert_eq!(sent.len(), 1);
        let (subject, body) = &sent[0];
        assert!(subject.contains("High CPU Usage"));
        assert!(body.contains("Current CPU Usage: 95.0%"));
        assert!(body.contains("PID: 4242, Name: stress, CPU: 97.0%"));
        assert_eq!(state.cpu.snapshot(), vec![50.0, 95.0, 96.0, 97.0]);
        assert_eq!(metrics.snapshot().alerts_suppressed, 2);
        assert_eq!(metrics.snapshot().ticks, 4);
    }

    #[tokio::test]
    async fn memory_alert_ranks_by_memory() {
        let h = Harness::new(MonitorConfig::default());
        h.source.push_cpu(&[5.0]);
        h.source.push_memory(&[92.5, 93.0]);
        h.source.set_disk("/", DiskScript::Usage(20.0));
        h.source.set_processes(vec![
            Ok(proc(10, "cpu-hog", 90.0, 1.0)),
            Ok(proc(11, "java", 2.0, 70.0)),
        ]);

        h.ticks(2).await;
        let (sent, state, _) = h.finish().await;

        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.contains("High Memory Usage"));
        let body = &sent[0].1;
        let java = body.find("Name: java").unwrap();
        let hog = body.find("Name: cpu-hog").unwrap();
        assert!(java < hog);
        assert_eq!(state.memory.snapshot(), vec![92.5, 93.0]);
    }

    #[tokio::test]
    async fn threshold_is_exclusive() {
        let h = Harness::new(MonitorConfig::default());
        quiet_source(&h.source);
        h.source.push_cpu(&[90.0]);
        h.ticks(1).await;
        let (sent, _, _) = h.finish().await;
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn disk_alerts_fire_every_breaching_tick() {
        let h = Harness::new(MonitorConfig::default());
        h.source.push_cpu(&[5.0]);
        h.source.push_memory(&[10.0]);
        h.source.set_disk("/", DiskScript::Usage(95.0));

        h.ticks(3).await;
        let (sent, state, _) = h.finish().await;

        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(s, _)| s.contains("High Disk Usage")));
        assert!(sent[0].1.contains("on /dev/vda1 mounted on /"));
        assert_eq!(state.disks[0].history.snapshot(), vec![95.0; 3]);
    }

    #[tokio::test]
    async fn unified_cooldown_gates_disk_alerts() {
        let cfg = MonitorConfig {
            unify_disk_cooldown: true,
            ..MonitorConfig::default()
        };
        let h = Harness::new(cfg);
        h.source.push_cpu(&[5.0]);
        h.source.push_memory(&[10.0]);
        h.source.set_disk("/", DiskScript::Usage(95.0));

        h.ticks(3).await;
        let (sent, _, metrics) = h.finish().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(metrics.snapshot().alerts_suppressed, 2);
    }

    #[tokio::test]
    async fn unmounted_path_is_skipped_without_touching_siblings() {
        let cfg = MonitorConfig {
            mounts: mounts(&[
                ("/", "/dev/vda1"),
                ("/mnt/volume_blr1_02", "/dev/sda"),
                ("/srv/locked", "/dev/sdb"),
            ]),
            ..MonitorConfig::default()
        };
        let h = Harness::new(cfg);
        h.source.push_cpu(&[5.0]);
        h.source.push_memory(&[10.0]);
        h.source.set_disk("/", DiskScript::Usage(40.0));
        h.source.set_disk("/mnt/volume_blr1_02", DiskScript::NotMounted);
        h.source.set_disk("/srv/locked", DiskScript::Denied);

        h.ticks(2).await;
        let (sent, state, metrics) = h.finish().await;

        assert!(sent.is_empty());
        assert_eq!(state.disks[0].history.snapshot(), vec![40.0, 40.0]);
        assert!(state.disks[1].history.is_empty());
        assert!(state.disks[2].history.is_empty());
        let snap = metrics.snapshot();
        assert_eq!(snap.mounts_skipped, 4);
        assert_eq!(snap.ticks, 2);
    }

    #[tokio::test]
    async fn failing_notifier_does_not_disturb_sampling() {
        let h = Harness::with_notifier(MonitorConfig::default(), RecordingNotifier::failing());
        h.source.push_cpu(&[99.0, 40.0]);
        h.source.push_memory(&[10.0]);
        h.source.set_disk("/", DiskScript::Usage(97.0));

        h.ticks(2).await;
        let (sent, state, metrics) = h.finish().await;

        // One cpu alert plus a disk alert per tick, all attempted and lost.
        assert_eq!(sent.len(), 3);
        assert_eq!(state.cpu.snapshot(), vec![99.0, 40.0]);
        let snap = metrics.snapshot();
        assert_eq!(snap.alerts_failed, 3);
        assert_eq!(snap.alerts_sent, 0);
        assert_eq!(snap.ticks, 2);
    }

    #[tokio::test]
    async fn history_stays_bounded_over_long_runs() {
        let cfg = MonitorConfig {
            history_capacity: 60,
            ..MonitorConfig::default()
        };
        let h = Harness::new(cfg);
        let samples: Vec<f32> = (0..75).map(|i| i as f32).collect();
        h.source.push_cpu(&samples);
        quiet_source(&h.source);

        h.ticks(75).await;
        let (_, state, _) = h.finish().await;

        let cpu = state.cpu.snapshot();
        assert_eq!(cpu.len(), 60);
        assert_eq!(cpu, samples[15..].to_vec());
        assert_eq!(state.memory.len(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_stopped() {
        let h = Harness::new(MonitorConfig::default());
        quiet_source(&h.source);
        h.source.push_cpu(&[12.0]);
        let metrics = Arc::clone(&h.metrics);
        let Harness {
            sampler,
            worker,
            ..
        } = h;

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(sampler.run(stop_rx));

        // Ticks at t=0s, 5s and 10s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();
        worker.await.unwrap();

        assert_eq!(metrics.snapshot().ticks, 3);
    }

    #[tokio::test]
    async fn stop_before_start_runs_no_ticks() {
        let h = Harness::new(MonitorConfig::default());
        let metrics = Arc::clone(&h.metrics);
        let (stop_tx, stop_rx) = watch::channel(true);
        h.sampler.run(stop_rx).await;
        drop(stop_tx);
        assert_eq!(metrics.snapshot().ticks, 0);
    }
}
