//! Persistence contracts and the in-memory store used by the server and
//! the tests.
//!
//! Sequence ids are allocated by the store itself, never derived from a
//! caller-side row count.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::controller::ActuatorState;
use crate::device::{DeviceState, DeviceStatus};
use crate::error::{Error, Result};
use crate::inference::FuzzyOutput;
use crate::params::{ControlParameters, ControlSettings};
use crate::telemetry::{AggregateRecord, Averages, NewSample, Phase, RealtimeSample};

/// The `realtime` and `records` tables plus the maturation-notice latch.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Every live sample, ordered by id.
    async fn realtime(&self) -> Result<Vec<RealtimeSample>>;

    async fn latest_realtime(&self) -> Result<Option<RealtimeSample>>;

    async fn count_phase(&self, phase: Phase) -> Result<usize>;

    /// Appends a sample under the next live sequence id.
    async fn insert_realtime(&self, sample: NewSample) -> Result<RealtimeSample>;

    async fn records(&self) -> Result<Vec<AggregateRecord>>;

    /// Archives one aggregate under the next record sequence id.
    async fn insert_record(&self, means: Averages) -> Result<AggregateRecord>;

    /// Deletes every live sample older than `keep` and renumbers `keep` to 1.
    async fn compact_realtime(&self, keep: u64) -> Result<RealtimeSample>;

    async fn maturation_notified(&self) -> Result<bool>;

    async fn set_maturation_notified(&self, notified: bool) -> Result<()>;

    /// Empties both tables, resets both sequences and clears the latch.
    async fn clear(&self) -> Result<()>;
}

/// The `control` and `fuzzy` rows.
#[async_trait]
pub trait ControlStore: Send + Sync {
    async fn settings(&self) -> Result<ControlSettings>;

    async fn update_parameters(&self, params: ControlParameters) -> Result<ControlSettings>;

    async fn update_moisture(&self, min: f64, max: f64) -> Result<ControlSettings>;

    async fn actuator(&self) -> Result<Option<ActuatorState>>;

    async fn set_actuator(&self, output: FuzzyOutput) -> Result<ActuatorState>;
}

/// The singleton `state` row.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn device(&self) -> Result<DeviceState>;

    async fn set_device(&self, status: DeviceStatus, at: DateTime<Utc>) -> Result<DeviceState>;
}

struct Inner {
    realtime: Vec<RealtimeSample>,
    next_realtime_id: u64,
    records: Vec<AggregateRecord>,
    next_record_id: u64,
    notified: bool,
    settings: ControlSettings,
    actuator: Option<ActuatorState>,
    device: DeviceState,
}

/// Single-unit store kept in process memory.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(settings: ControlSettings) -> Self {
        Self {
            inner: RwLock::new(Inner {
                realtime: Vec::new(),
                next_realtime_id: 1,
                records: Vec::new(),
                next_record_id: 1,
                notified: false,
                settings,
                actuator: None,
                device: DeviceState {
                    status: DeviceStatus::Inactive,
                    date: Utc::now(),
                },
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(ControlSettings {
            parameters: ControlParameters::default(),
            moist_min: 40.0,
            moist_max: 60.0,
            updated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn realtime(&self) -> Result<Vec<RealtimeSample>> {
        Ok(self.inner.read().await.realtime.clone())
    }

    async fn latest_realtime(&self) -> Result<Option<RealtimeSample>> {
        let inner = self.inner.read().await;
        Ok(inner.realtime.iter().max_by_key(|s| s.inserted_at).copied())
    }

    async fn count_phase(&self, phase: Phase) -> Result<usize> {
        let inner = self.inner.read().await;
        Ok(inner.realtime.iter().filter(|s| s.phase == phase).count())
    }

    async fn insert_realtime(&self, sample: NewSample) -> Result<RealtimeSample> {
        let mut inner = self.inner.write().await;
        let row = RealtimeSample {
            id: inner.next_realtime_id,
            temp: sample.temp,
            moist: sample.moist,
            ph: sample.ph,
            phase: sample.phase,
            inserted_at: Utc::now(),
        };
        inner.next_realtime_id += 1;
        inner.realtime.push(row);
        Ok(row)
    }

    async fn records(&self) -> Result<Vec<AggregateRecord>> {
        Ok(self.inner.read().await.records.clone())
    }

    async fn insert_record(&self, means: Averages) -> Result<AggregateRecord> {
        let mut inner = self.inner.write().await;
        let record = AggregateRecord {
            id: inner.next_record_id,
            temp: means.temp,
            moist: means.moist,
            ph: means.ph,
        };
        inner.next_record_id += 1;
        inner.records.push(record);
        Ok(record)
    }

    async fn compact_realtime(&self, keep: u64) -> Result<RealtimeSample> {
        let mut inner = self.inner.write().await;
        if !inner.realtime.iter().any(|s| s.id == keep) {
            return Err(Error::Storage(format!("realtime row {keep} not found")));
        }
        inner.realtime.retain(|s| s.id >= keep);
        inner.realtime.sort_by_key(|s| s.id);
        // Anything that arrived after `keep` follows it in order.
        for (i, s) in inner.realtime.iter_mut().enumerate() {
            s.id = i as u64 + 1;
        }
        inner.next_realtime_id = inner.realtime.len() as u64 + 1;
        Ok(inner.realtime[0])
    }

    async fn maturation_notified(&self) -> Result<bool> {
        Ok(self.inner.read().await.notified)
    }

    async fn set_maturation_notified(&self, notified: bool) -> Result<()> {
        self.inner.write().await.notified = notified;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.realtime.clear();
        inner.records.clear();
        inner.next_realtime_id = 1;
        inner.next_record_id = 1;
        inner.notified = false;
        Ok(())
    }
}

#[async_trait]
impl ControlStore for MemoryStore {
    async fn settings(&self) -> Result<ControlSettings> {
        Ok(self.inner.read().await.settings)
    }

    async fn update_parameters(&self, params: ControlParameters) -> Result<ControlSettings> {
        let mut inner = self.inner.write().await;
        inner.settings.parameters = params;
        inner.settings.updated_at = Utc::now();
        Ok(inner.settings)
    }

    async fn update_moisture(&self, min: f64, max: f64) -> Result<ControlSettings> {
        let mut inner = self.inner.write().await;
        inner.settings.moist_min = min;
        inner.settings.moist_max = max;
        inner.settings.updated_at = Utc::now();
        Ok(inner.settings)
    }

    async fn actuator(&self) -> Result<Option<ActuatorState>> {
        Ok(self.inner.read().await.actuator)
    }

    async fn set_actuator(&self, output: FuzzyOutput) -> Result<ActuatorState> {
        let state = ActuatorState {
            output,
            updated_at: Utc::now(),
        };
        self.inner.write().await.actuator = Some(state);
        Ok(state)
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn device(&self) -> Result<DeviceState> {
        Ok(self.inner.read().await.device)
    }

    async fn set_device(&self, status: DeviceStatus, at: DateTime<Utc>) -> Result<DeviceState> {
        let mut inner = self.inner.write().await;
        inner.device = DeviceState { status, date: at };
        Ok(inner.device)
    }
}
