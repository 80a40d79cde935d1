//! Maturation notices.
//!
//! The dispatcher fires once per batch: the first time the live buffer holds
//! enough maturation samples it sets a persisted latch and hands the
//! broadcast to a background task. The latch only clears when the telemetry
//! tables are reset for a new batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::store::TelemetryStore;
use crate::telemetry::Phase;

pub const MATURATION_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient_name: String,
    pub recipient_address: String,
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn maturation(recipient: &Recipient) -> Self {
        Self {
            recipient_name: recipient.name.clone(),
            recipient_address: recipient.email.clone(),
            subject: "Your Compost is Done!".to_string(),
            body: format!(
                "Dear {},\n\nYour compost has reached its maturation phase. \
                 You are free to stop the composting process.\n",
                recipient.name
            ),
        }
    }
}

#[async_trait]
pub trait NoticeTransport: Send + Sync {
    async fn send_notice(&self, notice: &Notice) -> Result<()>;
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn recipients(&self) -> Result<Vec<Recipient>>;
}

/// Fixed recipient list.
#[derive(Debug, Clone, Default)]
pub struct StaticRecipients(pub Vec<Recipient>);

#[async_trait]
impl RecipientDirectory for StaticRecipients {
    async fn recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Bound on each individual attempt.
    pub timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct MaturationDispatcher {
    threshold: usize,
    directory: Arc<dyn RecipientDirectory>,
    transport: Arc<dyn NoticeTransport>,
    policy: DispatchPolicy,
}

impl MaturationDispatcher {
    pub fn new(
        threshold: usize,
        directory: Arc<dyn RecipientDirectory>,
        transport: Arc<dyn NoticeTransport>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            threshold,
            directory,
            transport,
            policy,
        }
    }

    /// Checks the live buffer and starts a broadcast if this is the first
    /// time the threshold is met in the current batch. The returned handle
    /// can be awaited but nothing on the ingest path needs to.
    pub async fn observe(
        &self,
        store: &dyn TelemetryStore,
    ) -> Result<Option<JoinHandle<DispatchReport>>> {
        if store.maturation_notified().await? {
            return Ok(None);
        }
        let count = store.count_phase(Phase::Maturation).await?;
        if count < self.threshold {
            return Ok(None);
        }

        store.set_maturation_notified(true).await?;
        info!(count, "maturation threshold reached, notifying recipients");

        let directory = self.directory.clone();
        let transport = self.transport.clone();
        let policy = self.policy;
        Ok(Some(tokio::spawn(async move {
            broadcast(directory.as_ref(), transport.as_ref(), policy).await
        })))
    }
}

/// Sends one maturation notice to every recipient, concurrently.
pub async fn broadcast(
    directory: &dyn RecipientDirectory,
    transport: &dyn NoticeTransport,
    policy: DispatchPolicy,
) -> DispatchReport {
    let recipients = match directory.recipients().await {
        Ok(r) => r,
        Err(e) => {
            error!("Error fetching recipients: {e}");
            return DispatchReport::default();
        }
    };

    let sends = recipients.iter().map(|r| async move {
        let notice = Notice::maturation(r);
        (r, deliver(transport, &notice, policy).await)
    });

    let mut report = DispatchReport::default();
    for (recipient, outcome) in join_all(sends).await {
        match outcome {
            Ok(()) => {
                info!(to = %recipient.email, "maturation notice sent to {}", recipient.name);
                report.delivered.push(recipient.email.clone());
            }
            Err(e) => {
                error!(to = %recipient.email, "Error sending notice to {}: {e}", recipient.name);
                report.failed.push(recipient.email.clone());
            }
        }
    }
    report
}

async fn deliver(
    transport: &dyn NoticeTransport,
    notice: &Notice,
    policy: DispatchPolicy,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        let sent = tokio::time::timeout(policy.timeout, transport.send_notice(notice)).await;
        let result = match sent {
            Ok(r) => r,
            Err(_) => Err(Error::Notice(format!("timed out after {:?}", policy.timeout))),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                warn!(to = %notice.recipient_address, attempt, "notice failed, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::store::MemoryStore;
    use crate::telemetry::NewSample;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NoticeTransport for Recorder {
        async fn send_notice(&self, notice: &Notice) -> Result<()> {
            self.sent.lock().unwrap().push(notice.recipient_address.clone());
            Ok(())
        }
    }

    /// Fails the first `failures` attempts.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NoticeTransport for Flaky {
        async fn send_notice(&self, _notice: &Notice) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::Notice("smtp unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn recipients() -> Arc<StaticRecipients> {
        Arc::new(StaticRecipients(vec![
            Recipient { name: "Hari".into(), email: "hari@example.com".into() },
            Recipient { name: "Sekar".into(), email: "sekar@example.com".into() },
        ]))
    }

    fn fast_policy(retries: u32) -> DispatchPolicy {
        DispatchPolicy { retries, timeout: Duration::from_secs(1) }
    }

    async fn push(store: &MemoryStore, phase: Phase) {
        store
            .insert_realtime(NewSample { temp: 30.0, moist: 50.0, ph: 7.0, phase })
            .await
            .unwrap();
    }

    #[test]
    fn notice_addresses_recipient_by_name() {
        let notice = Notice::maturation(&Recipient { name: "Hari".into(), email: "h@x.io".into() });
        assert_eq!(notice.subject, "Your Compost is Done!");
        assert!(notice.body.starts_with("Dear Hari,"));
        assert_eq!(notice.recipient_address, "h@x.io");
    }

    #[tokio::test]
    async fn fires_once_at_threshold() {
        let store = MemoryStore::default();
        let transport = Arc::new(Recorder::default());
        let d = MaturationDispatcher::new(3, recipients(), transport.clone(), fast_policy(0));

        for _ in 0..2 {
            push(&store, Phase::Maturation).await;
            assert!(d.observe(&store).await.unwrap().is_none());
        }
        push(&store, Phase::Maturation).await;
        let report = d.observe(&store).await.unwrap().unwrap().await.unwrap();
        assert_eq!(report.delivered.len(), 2);

        push(&store, Phase::Maturation).await;
        assert!(d.observe(&store).await.unwrap().is_none());
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn retries_failed_sends() {
        let flaky = Flaky { failures: 2, calls: AtomicU32::new(0) };
        let one = StaticRecipients(vec![Recipient { name: "A".into(), email: "a@x.io".into() }]);

        let report = broadcast(&one, &flaky, fast_policy(2)).await;
        assert_eq!(report.delivered, vec!["a@x.io".to_string()]);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let flaky = Flaky { failures: 10, calls: AtomicU32::new(0) };
        let one = StaticRecipients(vec![Recipient { name: "A".into(), email: "a@x.io".into() }]);

        let report = broadcast(&one, &flaky, fast_policy(1)).await;
        assert!(report.delivered.is_empty());
        assert_eq!(report.failed, vec!["a@x.io".to_string()]);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_phases_do_not_count() {
        let store = MemoryStore::default();
        let recorder = Arc::new(Recorder::default());
        let d = MaturationDispatcher::new(3, recipients(), recorder, fast_policy(0));
        for phase in [Phase::Maturation, Phase::Cooling, Phase::Maturation, Phase::Thermophilic] {
            push(&store, phase).await;
            assert!(d.observe(&store).await.unwrap().is_none());
        }
        assert!(!store.maturation_notified().await.unwrap());
    }
}
