//! OS metric queries behind a trait so the sampling loop and the HTTP
//! handlers can be driven by a scripted source in tests.

use crate::types::{DiskStats, MemoryStats, ProcessRecord, used_percent};
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use sysinfo::{Disks, ProcessesToUpdate, System};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} is not mounted")]
    NotMounted(PathBuf),
    #[error("permission denied accessing {0}")]
    PermissionDenied(PathBuf),
    #[error("process {0} vanished during enumeration")]
    ProcessVanished(u32),
    #[error("metric query failed: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Errors that only cost a single data point.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotMounted(_) | Self::PermissionDenied(_) | Self::ProcessVanished(_)
        )
    }
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// System-wide CPU utilization measured over `window`. Suspends the
    /// caller for roughly that long.
    async fn cpu_percent(&self, window: Duration) -> Result<f32, SourceError>;

    async fn memory(&self) -> Result<MemoryStats, SourceError>;

    async fn disk(&self, mount: &Path) -> Result<DiskStats, SourceError>;

    /// Every enumerable process in source order. Entries that disappear
    /// or deny access while being read come back as `Err`. Per-process CPU
    /// shares cover the most recent `cpu_percent` window.
    async fn processes(&self) -> Vec<Result<ProcessRecord, SourceError>>;

    fn cpu_count(&self) -> usize;
}

/// `SnapshotSource` backed by `sysinfo`.
///
/// Every `cpu_percent` call measures the global reading on a private
/// `System`, so overlapping callers never shift each other's baseline. The
/// process table has a single owner per window: whoever takes `window`
/// refreshes it at both ends of its measurement, and concurrent callers
/// skip the table instead of waiting. `processes` only copies the last
/// captured table.
pub struct SysinfoSource {
    window: tokio::sync::Mutex<()>,
    table_sys: Arc<Mutex<System>>,
    table: Arc<RwLock<Vec<ProcessRecord>>>,
    memory_sys: Mutex<System>,
    cpu_count: usize,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut table_sys = System::new();
        table_sys.refresh_memory();
        table_sys.refresh_cpu_usage();
        table_sys.refresh_processes(ProcessesToUpdate::All, true);
        let cpu_count = table_sys.cpus().len().max(1);
        let table = capture_table(&table_sys);

        let mut memory_sys = System::new();
        memory_sys.refresh_memory();

        Self {
            window: tokio::sync::Mutex::new(()),
            table_sys: Arc::new(Mutex::new(table_sys)),
            table: Arc::new(RwLock::new(table)),
            memory_sys: Mutex::new(memory_sys),
            cpu_count,
        }
    }

    /// Refreshes the shared process table off the async runtime. With
    /// `publish` the resulting shares replace the table `processes` serves.
    async fn refresh_table(&self, publish: bool) -> Result<(), SourceError> {
        let sys = Arc::clone(&self.table_sys);
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || {
            let mut sys = sys.lock().unwrap_or_else(|p| p.into_inner());
            sys.refresh_memory();
            sys.refresh_cpu_usage();
            sys.refresh_processes(ProcessesToUpdate::All, true);
            if publish {
                let records = capture_table(&sys);
                debug!("[source] captured {} processes", records.len());
                *table.write().unwrap_or_else(|p| p.into_inner()) = records;
            }
        })
        .await
        .map_err(|err| SourceError::Io(io::Error::other(err)))
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSource for SysinfoSource {
    async fn cpu_percent(&self, window: Duration) -> Result<f32, SourceError> {
        let owner = self.window.try_lock().ok();
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        if owner.is_some() {
            self.refresh_table(false).await?;
        }

        tokio::time::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)).await;

        sys.refresh_cpu_usage();
        if owner.is_some() {
            self.refresh_table(true).await?;
        }
        Ok(sys.global_cpu_usage())
    }

    async fn memory(&self) -> Result<MemoryStats, SourceError> {
        let mut sys = self.memory_sys.lock().unwrap_or_else(|p| p.into_inner());
        sys.refresh_memory();
        let total = sys.total_memory();
        let free = sys.available_memory();
        Ok(MemoryStats {
            percent: used_percent(total, free),
            free,
            total,
        })
    }

    async fn disk(&self, mount: &Path) -> Result<DiskStats, SourceError> {
        let mount = mount.to_path_buf();
        tokio::task::spawn_blocking(move || read_disk(&mount))
            .await
            .map_err(|err| SourceError::Io(io::Error::other(err)))?
    }

    async fn processes(&self) -> Vec<Result<ProcessRecord, SourceError>> {
        self.table
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .map(Ok)
            .collect()
    }

    fn cpu_count(&self) -> usize {
        self.cpu_count
    }
}

fn read_disk(mount: &Path) -> Result<DiskStats, SourceError> {
    check_mount_access(mount)?;
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == mount)
        .ok_or_else(|| SourceError::NotMounted(mount.to_path_buf()))?;
    let total = disk.total_space();
    let free = disk.available_space();
    Ok(DiskStats {
        percent: used_percent(total, free),
        free,
        total,
    })
}

fn capture_table(sys: &System) -> Vec<ProcessRecord> {
    let total_memory = sys.total_memory();
    let mut records: Vec<_> = sys
        .processes()
        .values()
        .map(|proc| {
            let memory_percent = if total_memory > 0 {
                ((proc.memory() as f64 / total_memory as f64) * 100.0) as f32
            } else {
                0.0
            };
            ProcessRecord {
                pid: proc.pid().as_u32(),
                name: proc.name().to_string_lossy().into_owned(),
                cpu_percent: finite_share(proc.cpu_usage()),
                memory_percent: finite_share(memory_percent),
            }
        })
        .collect();
    records.sort_by_key(|r| r.pid);
    records
}

/// JSON has no NaN or infinity; such shares are reported as 0.
fn finite_share(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}

/// Maps the failure modes of touching a mount point onto the
/// skip-this-mount conditions the sampling loop understands.
fn check_mount_access(mount: &Path) -> Result<(), SourceError> {
    match std::fs::metadata(mount) {
        Ok(_) => Ok(()),
        Err(err) => Err(classify_io(mount, err)),
    }
}

fn classify_io(mount: &Path, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::NotMounted(mount.to_path_buf()),
        io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(mount.to_path_buf()),
        _ => SourceError::Io(err),
    }
}
