use crate::source::{SnapshotSource, SourceError};
use crate::types::ProcessRecord;
use log::{debug, warn};
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    #[default]
    Cpu,
    Memory,
}

impl RankBy {
    fn share(self, record: &ProcessRecord) -> f32 {
        match self {
            Self::Cpu => record.cpu_percent,
            Self::Memory => record.memory_percent,
        }
    }
}

/// Ranks a fresh process snapshot by CPU or memory share.
pub struct ProcessRanker {
    source: Arc<dyn SnapshotSource>,
}

impl ProcessRanker {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    pub async fn top(&self, k: usize, by: RankBy) -> Vec<ProcessRecord> {
        let records = collect_live(self.source.processes().await);
        rank(records, k, by)
    }
}

/// Drops entries that vanished or denied access mid-enumeration, keeping
/// the first-seen order of the rest.
pub fn collect_live(entries: Vec<Result<ProcessRecord, SourceError>>) -> Vec<ProcessRecord> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(record) => Some(record),
            Err(err) if err.is_transient() => {
                debug!("[ranker] skipping process: {err}");
                None
            }
            Err(err) => {
                warn!("[ranker] skipping unreadable process: {err}");
                None
            }
        })
        .collect()
}

/// Top `k` records, descending by the chosen share. The sort is stable so
/// equal shares keep snapshot order; NaN shares rank last.
pub fn rank(mut records: Vec<ProcessRecord>, k: usize, by: RankBy) -> Vec<ProcessRecord> {
    records.sort_by(|a, b| descending(by.share(a), by.share(b)));
    records.truncate(k);
    records
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
