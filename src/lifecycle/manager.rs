use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::subscription::{release, TransientSubscription};
use crate::{broker::BrokerConnection, config::LifecycleSettings, error::log_error};

/// One entry of a queue group: subject plus its auto-reply payload.
pub type ReplySpec = (String, Bytes);

/// Owns every transient subscription from creation until expiry.
///
/// Each batch (one subscription for a reply, N for a queue group) gets a
/// single expiry task that sleeps for the TTL and then cancels the batch in
/// creation order. Batches cannot be cancelled early or extended; only
/// [`SubscriptionManager::shutdown`] fires them ahead of time.
pub struct SubscriptionManager {
    broker: Arc<dyn BrokerConnection>,
    ttl: Duration,
    shutdown_grace: Duration,
    tasks: Mutex<JoinSet<()>>,
    shutdown: watch::Sender<bool>,
    pending: Arc<AtomicUsize>,
    accepting: AtomicBool,
}

/// Decrements the pending-batch counter however the expiry task ends.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SubscriptionManager {
    pub fn new(
        broker: Arc<dyn BrokerConnection>,
        ttl: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            broker,
            ttl,
            shutdown_grace,
            tasks: Mutex::new(JoinSet::new()),
            shutdown,
            pending: Arc::new(AtomicUsize::new(0)),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn from_settings(
        broker: Arc<dyn BrokerConnection>,
        settings: &LifecycleSettings,
    ) -> Self {
        Self::new(broker, settings.subscription_ttl(), settings.shutdown_grace())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of batches whose expiry has not completed yet.
    pub fn pending_batches(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Creates one auto-reply subscription expiring after the TTL.
    ///
    /// Returns as soon as the broker accepted the registration. A failed
    /// registration yields a degraded, inert subscription.
    pub async fn create_reply(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> Arc<TransientSubscription> {
        let subscription = self.open(subject, payload).await;
        self.schedule_expiry(vec![subscription.clone()]);
        subscription
    }

    /// Creates one subscription per entry, in order, sharing one expiry.
    ///
    /// An empty input schedules nothing.
    pub async fn create_queue_group<I>(
        &self,
        entries: I,
    ) -> Vec<Arc<TransientSubscription>>
    where
        I: IntoIterator<Item = ReplySpec>,
    {
        let mut batch = Vec::new();
        for (subject, payload) in entries {
            batch.push(self.open(&subject, payload).await);
        }
        self.schedule_expiry(batch.clone());
        batch
    }

    /// Fires every pending expiry now and waits up to the shutdown grace for
    /// them to finish. Later batches are created inert.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        self.shutdown.send_replace(true);

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let pending = tasks.len();
        info!(
            pending_batches = pending,
            grace_ms = self.shutdown_grace.as_millis() as u64,
            "Expiring pending subscription batches"
        );

        let joined = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(err) = result {
                    warn!(error = %err, "Expiry task failed");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!(
                remaining = tasks.len(),
                "Shutdown grace elapsed, abandoning remaining expiry tasks"
            );
            tasks.abort_all();
        }
    }

    async fn open(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> Arc<TransientSubscription> {
        if !self.is_accepting() {
            warn!(subject, "Shutting down, subscription created inert");
            return Arc::new(TransientSubscription::degraded(subject, payload));
        }

        match self
            .broker
            .subscribe_with_auto_reply(subject, payload.clone())
            .await
        {
            Ok(handle) => Arc::new(TransientSubscription::active(subject, payload, handle)),
            Err(err) => {
                log_error("Subscription registration failed, entry is inert", &err);
                Arc::new(TransientSubscription::degraded(subject, payload))
            }
        }
    }

    fn schedule_expiry(
        &self,
        batch: Vec<Arc<TransientSubscription>>,
    ) {
        if batch.is_empty() {
            return;
        }

        let batch_id = Uuid::new_v4();
        let size = batch.len();
        self.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(self.pending.clone());

        let mut tasks = self.tasks.lock();
        // reap finished expiries so the set does not grow without bound
        while tasks.try_join_next().is_some() {}
        tasks.spawn(expire_batch(
            batch_id,
            batch,
            self.ttl,
            self.shutdown.subscribe(),
            guard,
        ));

        info!(
            batch = %batch_id,
            size,
            ttl_secs = self.ttl.as_secs(),
            "Subscription batch scheduled"
        );
    }
}

/// Sleeps for `ttl` (or until shutdown) and cancels the batch in order.
async fn expire_batch(
    batch_id: Uuid,
    batch: Vec<Arc<TransientSubscription>>,
    ttl: Duration,
    mut shutdown: watch::Receiver<bool>,
    _guard: PendingGuard,
) {
    let signalled = async {
        // a dropped manager never fires early
        if shutdown.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let early = tokio::select! {
        _ = tokio::time::sleep(ttl) => false,
        _ = signalled => true,
    };

    // the whole batch leaves Active before any network round-trip
    let handles = batch
        .iter()
        .map(|sub| (sub.subject(), sub.mark_cancelled()))
        .collect::<Vec<_>>();
    for (subject, handle) in handles {
        if let Some(handle) = handle {
            release(subject, handle).await;
        }
    }

    if early {
        debug!(batch = %batch_id, "Batch expired early on shutdown");
    }
    info!(batch = %batch_id, size = batch.len(), early, "Subscription batch expired");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::MemoryBroker, lifecycle::SubscriptionState};

    const TTL: Duration = Duration::from_secs(30);

    fn manager() -> (Arc<MemoryBroker>, SubscriptionManager) {
        let broker = Arc::new(MemoryBroker::new(16));
        let manager = SubscriptionManager::new(broker.clone(), TTL, Duration::from_secs(5));
        (broker, manager)
    }

    async fn settle(manager: &SubscriptionManager) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.pending_batches() > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("expiry tasks did not finish in time");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_expires_after_ttl_and_not_before() {
        let (broker, manager) = manager();
        let sub = manager
            .create_reply("svc.time", Bytes::from_static(b"noon"))
            .await;
        assert_eq!(sub.state(), SubscriptionState::Active);
        assert_eq!(broker.subscriber_count("svc.time"), 1);
        assert_eq!(manager.pending_batches(), 1);

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert!(sub.is_active());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle(&manager).await;
        assert_eq!(sub.state(), SubscriptionState::Cancelled);
        assert_eq!(broker.subscriber_count("svc.time"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_group_shares_one_expiry() {
        let (broker, manager) = manager();
        let entries = (0..3)
            .map(|i| (format!("group.{i}"), Bytes::from(format!("reply-{i}"))))
            .collect::<Vec<_>>();

        let batch = manager.create_queue_group(entries).await;
        assert_eq!(batch.len(), 3);
        assert_eq!(manager.pending_batches(), 1);
        assert!(batch.iter().all(|sub| sub.is_active()));
        assert_eq!(batch[2].subject(), "group.2");

        tokio::time::advance(TTL).await;
        settle(&manager).await;
        assert!(batch.iter().all(|sub| !sub.is_active()));
        assert_eq!(broker.subscriber_count("group.0"), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_group_schedules_nothing() {
        let (_broker, manager) = manager();
        let batch = manager.create_queue_group(Vec::new()).await;
        assert!(batch.is_empty());
        assert_eq!(manager.pending_batches(), 0);
    }

    /// Registration failures produce inert entries without aborting the batch.
    #[tokio::test(start_paused = true)]
    async fn test_failed_registration_yields_degraded_entry() {
        let (_broker, manager) = manager();
        let batch = manager
            .create_queue_group(vec![
                ("ok".to_string(), Bytes::new()),
                (String::new(), Bytes::new()),
            ])
            .await;

        assert!(!batch[0].is_degraded());
        assert!(batch[1].is_degraded());

        tokio::time::advance(TTL).await;
        settle(&manager).await;
        assert!(batch.iter().all(|sub| !sub.is_active()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fires_pending_expiries() {
        let (broker, manager) = manager();
        let sub = manager.create_reply("svc", Bytes::new()).await;

        manager.shutdown().await;
        assert!(!sub.is_active());
        assert_eq!(manager.pending_batches(), 0);
        assert_eq!(broker.subscriber_count("svc"), 0);

        let late = manager.create_reply("svc", Bytes::new()).await;
        assert!(late.is_degraded());
        assert!(!manager.is_accepting());
    }

    /// Cancelling after the broker is drained never panics.
    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_drain_is_harmless() {
        let (broker, manager) = manager();
        let sub = manager.create_reply("svc", Bytes::new()).await;

        broker.drain().await.unwrap();
        tokio::time::advance(TTL).await;
        settle(&manager).await;
        assert!(!sub.is_active());
    }
}
