use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bridge_error::{BrokerError, BrokerResult};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{validate_subject, BrokerConnection, Message, ReplyHandle, Subscription};
use crate::error::RecvError;

type SubjectKey = Arc<str>;

/// In-process pub/sub broker.
///
/// Supports:
/// - Exact-subject subscriptions over `broadcast` channels
/// - Request/reply through unique `_INBOX.*` subjects
/// - Auto-reply responders running on their own tasks
/// - Automatic removal of subjects nobody listens to
/// - Publish and failed-send counters
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

struct Shared {
    /// Subject → `Sender`
    channels: DashMap<SubjectKey, broadcast::Sender<Message>>,
    /// Buffer size of every `broadcast::channel`
    default_capacity: usize,
    /// Set once by `drain`
    closed: AtomicBool,
    /// Total number of deliveries
    publish_count: AtomicUsize,
    /// Deliveries to a subject whose receivers were all gone
    send_error_count: AtomicUsize,
}

/// Responder registration of the in-process broker.
struct MemoryReplyHandle {
    shared: Arc<Shared>,
    subject: Arc<str>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Shared {
    /// Sends `msg` to the subscribers of its subject.
    ///
    /// When nobody listens on the subject any more, `send_error_count` grows
    /// and the subject is removed.
    fn deliver(
        &self,
        msg: Message,
    ) {
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = self.channels.get(msg.subject.as_ref()) else {
            return;
        };
        let tx = entry.value().clone();
        let key = entry.key().clone();
        drop(entry);

        if tx.send(msg).is_err() {
            self.send_error_count.fetch_add(1, Ordering::Relaxed);
        }
        if tx.receiver_count() == 0 {
            self.channels
                .remove_if(&key, |_, sender| sender.receiver_count() == 0);
        }
    }
}

impl MemoryBroker {
    /// Creates a broker whose subjects buffer up to `default_capacity`
    /// messages per receiver.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                channels: DashMap::new(),
                default_capacity: default_capacity.max(1),
                closed: AtomicBool::new(false),
                publish_count: AtomicUsize::new(0),
                send_error_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribes to an exact subject.
    pub fn subscribe(
        &self,
        subject: &str,
    ) -> BrokerResult<Subscription> {
        validate_subject(subject)?;
        self.ensure_open()?;

        let key: SubjectKey = Arc::from(subject);
        let tx = self
            .shared
            .channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.shared.default_capacity).0)
            .clone();
        Ok(Subscription {
            subject: key,
            inner: tx.subscribe(),
        })
    }

    /// Number of live receivers on `subject`.
    pub fn subscriber_count(
        &self,
        subject: &str,
    ) -> usize {
        self.shared
            .channels
            .get(subject)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn has_subscribers(
        &self,
        subject: &str,
    ) -> bool {
        self.subscriber_count(subject) > 0
    }

    /// Drops every subscription on `subject` together with the subject.
    pub fn unsubscribe_all(
        &self,
        subject: &str,
    ) {
        self.shared.channels.remove(subject);
    }

    /// Number of subjects currently known to the broker.
    pub fn subject_count(&self) -> usize {
        self.shared.channels.len()
    }

    pub fn publish_count(&self) -> usize {
        self.shared.publish_count.load(Ordering::Relaxed)
    }

    pub fn send_error_count(&self) -> usize {
        self.shared.send_error_count.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConnection for MemoryBroker {
    async fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> BrokerResult<()> {
        validate_subject(subject)?;
        self.ensure_open()?;
        self.shared.deliver(Message::new(subject, payload));
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> BrokerResult<Message> {
        validate_subject(subject)?;
        self.ensure_open()?;

        if !self.has_subscribers(subject) {
            return Err(BrokerError::NoResponders {
                subject: subject.to_string(),
            });
        }

        let inbox = format!("_INBOX.{}", Uuid::new_v4().simple());
        let mut reply_sub = self.subscribe(&inbox)?;
        self.shared
            .deliver(Message::new(subject, payload).with_reply(inbox.as_str()));

        let outcome = tokio::time::timeout(timeout, reply_sub.recv()).await;
        drop(reply_sub);
        self.unsubscribe_all(&inbox);

        match outcome {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_)) => Err(BrokerError::Closed),
            Err(_) => Err(BrokerError::Timeout {
                subject: subject.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn subscribe_with_auto_reply(
        &self,
        subject: &str,
        reply_payload: Bytes,
    ) -> BrokerResult<Box<dyn ReplyHandle>> {
        let sub = self.subscribe(subject)?;
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_responder(
            self.shared.clone(),
            sub,
            reply_payload,
            stop_rx,
        ));

        debug!(subject, "Auto-reply responder registered");
        Ok(Box::new(MemoryReplyHandle {
            shared: self.shared.clone(),
            subject: Arc::from(subject),
            stop,
            task,
        }))
    }

    async fn drain(&self) -> BrokerResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // dropping the senders closes every receiver
        self.shared.channels.clear();
        debug!("In-memory broker drained");
        Ok(())
    }

    fn servers(&self) -> Vec<String> {
        vec!["memory://local".to_string()]
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ReplyHandle for MemoryReplyHandle {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn unsubscribe(self: Box<Self>) -> BrokerResult<()> {
        let Self {
            shared,
            subject,
            stop,
            task,
        } = *self;
        // the responder may already be gone after a drain
        let _ = stop.send(());
        let joined = task.await.map_err(|err| BrokerError::Unsubscribe {
            subject: subject.to_string(),
            reason: err.to_string(),
        });
        // the responder's receiver is gone now; drop the subject if it was the last
        shared
            .channels
            .remove_if(subject.as_ref(), |_, tx| tx.receiver_count() == 0);
        joined
    }
}

async fn run_responder(
    shared: Arc<Shared>,
    mut sub: Subscription,
    reply_payload: Bytes,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            received = sub.recv() => match received {
                Ok(msg) => match msg.reply {
                    Some(reply) => shared.deliver(Message::new(reply, reply_payload.clone())),
                    None => trace!(subject = %sub.subject, "Message without reply subject ignored"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subject = %sub.subject, skipped, "Auto-reply responder lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(subject = %sub.subject, "Auto-reply responder stopped");
}
