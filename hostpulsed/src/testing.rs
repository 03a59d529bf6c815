//! Scripted collaborators shared by the unit tests.

use crate::notifier::Notifier;
use crate::source::{SnapshotSource, SourceError};
use crate::types::{DiskStats, MemoryStats, ProcessRecord};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub fn proc(pid: u32, name: &str, cpu: f32, mem: f32) -> ProcessRecord {
    ProcessRecord {
        pid,
        name: name.to_string(),
        cpu_percent: cpu,
        memory_percent: mem,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DiskScript {
    Usage(f32),
    NotMounted,
    Denied,
}

/// Replays queued readings; the last value of each queue repeats once the
/// queue is drained.
#[derive(Default)]
pub struct FakeSource {
    cpu: Mutex<VecDeque<f32>>,
    last_cpu: Mutex<f32>,
    memory: Mutex<VecDeque<f32>>,
    last_memory: Mutex<f32>,
    disks: Mutex<HashMap<PathBuf, DiskScript>>,
    processes: Mutex<Vec<Result<ProcessRecord, ProcessFault>>>,
}

/// Replayable stand-in for a per-process `SourceError`, which is not `Clone`.
#[derive(Debug, Clone)]
enum ProcessFault {
    Vanished(u32),
    Denied(PathBuf),
    NotMounted(PathBuf),
    Io(io::ErrorKind),
}

impl ProcessFault {
    fn from_error(err: &SourceError) -> Self {
        match err {
            SourceError::ProcessVanished(pid) => Self::Vanished(*pid),
            SourceError::PermissionDenied(path) => Self::Denied(path.clone()),
            SourceError::NotMounted(path) => Self::NotMounted(path.clone()),
            SourceError::Io(err) => Self::Io(err.kind()),
        }
    }

    fn to_error(&self) -> SourceError {
        match self {
            Self::Vanished(pid) => SourceError::ProcessVanished(*pid),
            Self::Denied(path) => SourceError::PermissionDenied(path.clone()),
            Self::NotMounted(path) => SourceError::NotMounted(path.clone()),
            Self::Io(kind) => SourceError::Io(io::Error::from(*kind)),
        }
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cpu(&self, values: &[f32]) {
        self.cpu.lock().unwrap().extend(values.iter().copied());
    }

    pub fn push_memory(&self, values: &[f32]) {
        self.memory.lock().unwrap().extend(values.iter().copied());
    }

    pub fn set_disk(&self, mount: &str, script: DiskScript) {
        self.disks
            .lock()
            .unwrap()
            .insert(PathBuf::from(mount), script);
    }

    pub fn set_processes(&self, entries: Vec<Result<ProcessRecord, SourceError>>) {
        let entries = entries
            .into_iter()
            .map(|entry| entry.map_err(|err| ProcessFault::from_error(&err)))
            .collect();
        *self.processes.lock().unwrap() = entries;
    }

    fn next(queue: &Mutex<VecDeque<f32>>, last: &Mutex<f32>) -> f32 {
        let mut last = last.lock().unwrap();
        if let Some(value) = queue.lock().unwrap().pop_front() {
            *last = value;
        }
        *last
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn cpu_percent(&self, _window: Duration) -> Result<f32, SourceError> {
        Ok(Self::next(&self.cpu, &self.last_cpu))
    }

    async fn memory(&self) -> Result<MemoryStats, SourceError> {
        let percent = Self::next(&self.memory, &self.last_memory);
        let total = 16 * 1024 * 1024 * 1024u64;
        let free = (total as f64 * (100.0 - percent as f64) / 100.0) as u64;
        Ok(MemoryStats {
            percent,
            free,
            total,
        })
    }

    async fn disk(&self, mount: &Path) -> Result<DiskStats, SourceError> {
        let script = self.disks.lock().unwrap().get(mount).copied();
        match script {
            Some(DiskScript::Usage(percent)) => {
                let total = 100 * 1024 * 1024 * 1024u64;
                let free = (total as f64 * (100.0 - percent as f64) / 100.0) as u64;
                Ok(DiskStats {
                    percent,
                    free,
                    total,
                })
            }
            Some(DiskScript::Denied) => Err(SourceError::PermissionDenied(mount.to_path_buf())),
            Some(DiskScript::NotMounted) | None => {
                Err(SourceError::NotMounted(mount.to_path_buf()))
            }
        }
    }

    async fn processes(&self) -> Vec<Result<ProcessRecord, SourceError>> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .map(|entry| match entry {
                Ok(record) => Ok(record.clone()),
                Err(fault) => Err(fault.to_error()),
            })
            .collect()
    }

    fn cpu_count(&self) -> usize {
        4
    }
}

/// Records every delivery; optionally fails them all.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        if self.fail {
            anyhow::bail!("smtp relay refused connection");
        }
        Ok(())
    }
}
