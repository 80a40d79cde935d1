//! Compacts a full live buffer into one archived aggregate.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::TelemetryStore;
use crate::telemetry::{AggregateRecord, Averages, RealtimeSample};

pub const ROTATION_THRESHOLD: usize = 864;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Rotation {
    NotEnoughData { buffered: usize },
    Archived { record: AggregateRecord, retained: RealtimeSample },
    /// The sample was kept but the buffer could not be rotated; the next
    /// ingest or an explicit rotation tries again.
    Deferred { reason: String },
}

impl Rotation {
    pub fn archived(&self) -> Option<&AggregateRecord> {
        match self {
            Rotation::Archived { record, .. } => Some(record),
            Rotation::NotEnoughData { .. } | Rotation::Deferred { .. } => None,
        }
    }
}

/// An aggregate that is already archived but whose samples are still in
/// the live buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingCompaction {
    record: AggregateRecord,
    keep: u64,
}

#[derive(Debug, Clone)]
pub struct RotationManager {
    threshold: usize,
    pending: Option<PendingCompaction>,
}

impl RotationManager {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            pending: None,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Archives the buffer means and keeps only the newest sample.
    ///
    /// The buffer is compacted only after the archive insert succeeded. If
    /// compaction fails the archived record is remembered, and the next call
    /// retries only the compaction, so archived samples are never averaged
    /// into a second record. The pending compaction lives in memory and is
    /// lost on restart.
    pub async fn rotate(&mut self, store: &dyn TelemetryStore) -> Result<Rotation> {
        if let Some(pending) = self.pending {
            let retained = store.compact_realtime(pending.keep).await?;
            self.pending = None;
            info!(record = pending.record.id, "deferred compaction finished");
            return Ok(Rotation::Archived {
                record: pending.record,
                retained,
            });
        }

        let samples = store.realtime().await?;
        if samples.len() < self.threshold {
            return Ok(Rotation::NotEnoughData {
                buffered: samples.len(),
            });
        }

        let means = Averages::of(&samples)
            .ok_or_else(|| Error::InvalidParameters("empty live buffer".into()))?;
        let newest = samples
            .iter()
            .max_by_key(|s| s.id)
            .map(|s| s.id)
            .ok_or_else(|| Error::InvalidParameters("empty live buffer".into()))?;

        let record = store.insert_record(means).await?;

        let retained = match store.compact_realtime(newest).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    record = record.id,
                    buffered = samples.len(),
                    "aggregate archived but live buffer not compacted: {e}"
                );
                self.pending = Some(PendingCompaction { record, keep: newest });
                return Err(e);
            }
        };

        info!(
            record = record.id,
            samples = samples.len(),
            temp = record.temp,
            moist = record.moist,
            ph = record.ph,
            "live buffer rotated"
        );
        Ok(Rotation::Archived { record, retained })
    }

    /// Forgets a pending compaction, for when both tables were cleared.
    pub fn discard_pending(&mut self) {
        self.pending = None;
    }
}

impl Default for RotationManager {
    fn default() -> Self {
        Self::new(ROTATION_THRESHOLD)
    }
}
