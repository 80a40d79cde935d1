//! Single-writer front of the live buffer: ingest, rotation and batch reset
//! all pass through one lock.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::notify::{DispatchReport, MaturationDispatcher};
use crate::rotation::{Rotation, RotationManager};
use crate::store::TelemetryStore;
use crate::telemetry::{AggregateRecord, NewSample, RealtimeSample};

#[derive(Debug)]
pub struct Ingested {
    pub sample: RealtimeSample,
    pub rotation: Rotation,
    /// Set when this ingest started the maturation broadcast.
    pub notice: Option<JoinHandle<DispatchReport>>,
}

pub struct TelemetryService {
    store: Arc<dyn TelemetryStore>,
    dispatcher: MaturationDispatcher,
    // The single writer lock. It also owns the rotation state.
    rotation: Mutex<RotationManager>,
}

impl TelemetryService {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        rotation: RotationManager,
        dispatcher: MaturationDispatcher,
    ) -> Self {
        Self {
            store,
            dispatcher,
            rotation: Mutex::new(rotation),
        }
    }

    /// Appends a sample, checks the maturation count, then rotates the
    /// buffer if it is full.
    ///
    /// Only validation and the insert itself can fail. Once the sample is
    /// stored, a failed maturation check or rotation is logged and reported
    /// through [`Rotation::Deferred`] so callers do not resend the sample.
    pub async fn ingest(&self, sample: NewSample) -> Result<Ingested> {
        sample.validate()?;
        let mut manager = self.rotation.lock().await;

        let row = self.store.insert_realtime(sample).await?;
        debug!(id = row.id, temp = row.temp, phase = ?row.phase, "sample stored");

        let notice = match self.dispatcher.observe(self.store.as_ref()).await {
            Ok(notice) => notice,
            Err(e) => {
                warn!(id = row.id, "maturation check skipped: {e}");
                None
            }
        };
        let rotation = match manager.rotate(self.store.as_ref()).await {
            Ok(r) => r,
            Err(e) => {
                warn!(id = row.id, "rotation deferred: {e}");
                Rotation::Deferred {
                    reason: e.to_string(),
                }
            }
        };

        Ok(Ingested {
            sample: row,
            rotation,
            notice,
        })
    }

    /// Explicit rotation. Unlike ingest, storage failures are returned.
    pub async fn rotate(&self) -> Result<Rotation> {
        let mut manager = self.rotation.lock().await;
        manager.rotate(self.store.as_ref()).await
    }

    /// Empties the live buffer and archive and re-arms the maturation notice.
    pub async fn reset(&self) -> Result<()> {
        let mut manager = self.rotation.lock().await;
        self.store.clear().await?;
        manager.discard_pending();
        info!("telemetry reset for a new batch");
        Ok(())
    }

    pub async fn latest(&self) -> Result<Option<RealtimeSample>> {
        self.store.latest_realtime().await
    }

    pub async fn records(&self) -> Result<Vec<AggregateRecord>> {
        self.store.records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::notify::{DispatchPolicy, Notice, NoticeTransport, StaticRecipients};
    use crate::store::MemoryStore;
    use crate::telemetry::Phase;

    struct Discard;

    #[async_trait]
    impl NoticeTransport for Discard {
        async fn send_notice(&self, _notice: &Notice) -> crate::Result<()> {
            Ok(())
        }
    }

    fn service(store: Arc<MemoryStore>, threshold: usize) -> TelemetryService {
        let dispatcher = MaturationDispatcher::new(
            3,
            Arc::new(StaticRecipients::default()),
            Arc::new(Discard),
            DispatchPolicy::default(),
        );
        TelemetryService::new(store, RotationManager::new(threshold), dispatcher)
    }

    fn reading(temp: f64) -> NewSample {
        NewSample { temp, moist: 55.0, ph: 7.1, phase: Phase::Mesophilic }
    }

    #[tokio::test]
    async fn ingest_assigns_ids_and_rotates_when_full() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), 3);

        assert_eq!(svc.ingest(reading(20.0)).await.unwrap().sample.id, 1);
        assert_eq!(svc.ingest(reading(21.0)).await.unwrap().sample.id, 2);
        let third = svc.ingest(reading(22.0)).await.unwrap();
        assert_eq!(third.sample.id, 3);
        assert!(third.rotation.archived().is_some());

        assert_eq!(svc.records().await.unwrap().len(), 1);
        assert_eq!(svc.latest().await.unwrap().unwrap().id, 1);
        assert_eq!(svc.ingest(reading(23.0)).await.unwrap().sample.id, 2);
    }

    #[tokio::test]
    async fn invalid_sample_is_not_stored() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), 3);
        assert!(svc.ingest(reading(f64::NAN)).await.is_err());
        assert!(svc.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_ingest_gets_distinct_ids() {
        let store = Arc::new(MemoryStore::default());
        let svc = Arc::new(service(store.clone(), 1000));
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.ingest(reading(i as f64)).await.unwrap().sample.id
                })
            })
            .collect();
        let mut ids = Vec::new();
        for t in tasks {
            ids.push(t.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=50).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), 2);
        svc.ingest(reading(20.0)).await.unwrap();
        svc.ingest(reading(20.0)).await.unwrap();
        svc.reset().await.unwrap();
        assert!(svc.latest().await.unwrap().is_none());
        assert!(svc.records().await.unwrap().is_empty());
    }
}
