use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Error, Result};
use crate::ingest::TelemetryService;
use crate::store::DeviceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Inactive,
    Active,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceStatus::Inactive => "deactivated",
            DeviceStatus::Active => "activated",
        })
    }
}

/// The singleton `state` row. `date` is when the status last changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub status: DeviceStatus,
    pub date: DateTime<Utc>,
}

impl DeviceState {
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }

    /// Whole days since `date`, rounded up. `None` unless active.
    pub fn days_elapsed(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_active() {
            return None;
        }
        let ms = (now - self.date).num_milliseconds().abs();
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        Some((ms + DAY_MS - 1) / DAY_MS)
    }
}

/// Activation lifecycle. Every switch starts a new batch, so the telemetry
/// tables are reset along with it.
pub struct DeviceService {
    store: Arc<dyn DeviceStore>,
    telemetry: Arc<TelemetryService>,
    // Serialises check, reset and write of the state row.
    switch_lock: Mutex<()>,
}

impl DeviceService {
    pub fn new(store: Arc<dyn DeviceStore>, telemetry: Arc<TelemetryService>) -> Self {
        Self {
            store,
            telemetry,
            switch_lock: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> Result<DeviceState> {
        self.store.device().await
    }

    pub async fn activate(&self) -> Result<DeviceState> {
        self.switch(DeviceStatus::Active).await
    }

    pub async fn deactivate(&self) -> Result<DeviceState> {
        self.switch(DeviceStatus::Inactive).await
    }

    pub async fn days_elapsed(&self) -> Result<i64> {
        self.store.device().await?.days_elapsed(Utc::now()).ok_or(Error::NotActive)
    }

    /// Telemetry is reset before the state row is written, so a failed
    /// reset leaves the device in its old state and the switch can be
    /// retried.
    async fn switch(&self, target: DeviceStatus) -> Result<DeviceState> {
        let _guard = self.switch_lock.lock().await;
        if self.store.device().await?.status == target {
            return Err(Error::AlreadyInState(target));
        }
        self.telemetry.reset().await?;
        let state = self.store.set_device(target, Utc::now()).await?;
        info!(status = %target, "device state updated");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::notify::{
        DispatchPolicy, MaturationDispatcher, Notice, NoticeTransport, StaticRecipients,
    };
    use crate::rotation::RotationManager;
    use crate::store::{MemoryStore, TelemetryStore};
    use crate::telemetry::{NewSample, Phase};

    struct Discard;

    #[async_trait::async_trait]
    impl NoticeTransport for Discard {
        async fn send_notice(&self, _notice: &Notice) -> Result<()> {
            Ok(())
        }
    }

    fn service(store: Arc<MemoryStore>) -> DeviceService {
        let dispatcher = MaturationDispatcher::new(
            3,
            Arc::new(StaticRecipients::default()),
            Arc::new(Discard),
            DispatchPolicy::default(),
        );
        let telemetry =
            TelemetryService::new(store.clone(), RotationManager::default(), dispatcher);
        DeviceService::new(store, Arc::new(telemetry))
    }

    #[tokio::test]
    async fn switching_twice_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store);
        assert!(matches!(svc.days_elapsed().await, Err(Error::NotActive)));
        assert!(matches!(
            svc.deactivate().await,
            Err(Error::AlreadyInState(DeviceStatus::Inactive))
        ));

        assert!(svc.activate().await.unwrap().is_active());
        assert!(svc.days_elapsed().await.unwrap() <= 1);
        let err = svc.activate().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BusinessRule);

        assert!(!svc.deactivate().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn activation_starts_a_new_batch() {
        let store = Arc::new(MemoryStore::default());
        let matured = NewSample { temp: 30.0, moist: 50.0, ph: 7.0, phase: Phase::Maturation };
        store.insert_realtime(matured).await.unwrap();
        store.set_maturation_notified(true).await.unwrap();

        service(store.clone()).activate().await.unwrap();
        assert!(store.realtime().await.unwrap().is_empty());
        assert!(!store.maturation_notified().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_activations_switch_once() {
        let store = Arc::new(MemoryStore::default());
        let svc = Arc::new(service(store));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.activate().await })
            })
            .collect();

        let mut switched = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(state) => {
                    assert!(state.is_active());
                    switched += 1;
                }
                Err(e) => assert!(matches!(e, Error::AlreadyInState(DeviceStatus::Active))),
            }
        }
        assert_eq!(switched, 1);
    }

    #[test]
    fn days_round_up() {
        let start = Utc::now();
        let state = DeviceState { status: DeviceStatus::Active, date: start };
        assert_eq!(state.days_elapsed(start), Some(0));
        assert_eq!(state.days_elapsed(start + Duration::hours(1)), Some(1));
        assert_eq!(state.days_elapsed(start + Duration::hours(24)), Some(1));
        assert_eq!(state.days_elapsed(start + Duration::hours(25)), Some(2));
    }

    #[test]
    fn inactive_has_no_age() {
        let state = DeviceState { status: DeviceStatus::Inactive, date: Utc::now() };
        assert_eq!(state.days_elapsed(Utc::now()), None);
    }

    #[test]
    fn status_message() {
        assert_eq!(
            crate::Error::AlreadyInState(DeviceStatus::Active).to_string(),
            "Device is already activated"
        );
    }
}
