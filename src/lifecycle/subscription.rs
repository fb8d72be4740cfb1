use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{broker::ReplyHandle, error::log_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Cancelled,
}

/// Short-lived auto-replying listener on one subject.
///
/// The state moves from `Active` to `Cancelled` exactly once; [`cancel`]
/// can be called any number of times. A degraded subscription has no
/// broker registration behind it, so cancelling it only flips the state.
///
/// [`cancel`]: TransientSubscription::cancel
pub struct TransientSubscription {
    id: Uuid,
    subject: Arc<str>,
    auto_reply_payload: Bytes,
    degraded: bool,
    cancelled: AtomicBool,
    handle: Mutex<Option<Box<dyn ReplyHandle>>>,
}

impl TransientSubscription {
    pub(crate) fn active(
        subject: &str,
        auto_reply_payload: Bytes,
        handle: Box<dyn ReplyHandle>,
    ) -> Self {
        Self::build(subject, auto_reply_payload, Some(handle))
    }

    /// Inert entry standing in for a failed registration.
    pub(crate) fn degraded(
        subject: &str,
        auto_reply_payload: Bytes,
    ) -> Self {
        Self::build(subject, auto_reply_payload, None)
    }

    fn build(
        subject: &str,
        auto_reply_payload: Bytes,
        handle: Option<Box<dyn ReplyHandle>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: Arc::from(subject),
            auto_reply_payload,
            degraded: handle.is_none(),
            cancelled: AtomicBool::new(false),
            handle: Mutex::new(handle),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn auto_reply_payload(&self) -> &Bytes {
        &self.auto_reply_payload
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn state(&self) -> SubscriptionState {
        if self.cancelled.load(Ordering::Acquire) {
            SubscriptionState::Cancelled
        } else {
            SubscriptionState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Stops auto-replying and removes the broker subscription.
    ///
    /// Unsubscribe failures, e.g. after the connection was drained, are
    /// logged and otherwise ignored.
    pub async fn cancel(&self) {
        if let Some(handle) = self.mark_cancelled() {
            release(&self.subject, handle).await;
        }
    }

    /// Flips the state to `Cancelled` and hands out the broker registration.
    ///
    /// Returns `None` when the subscription was already cancelled or is
    /// degraded.
    pub(crate) fn mark_cancelled(&self) -> Option<Box<dyn ReplyHandle>> {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return None;
        }
        let handle = self.handle.lock().take();
        if handle.is_none() {
            debug!(id = %self.id, subject = %self.subject, "Inert subscription cancelled");
        }
        handle
    }
}

/// Unsubscribes a registration taken out by `mark_cancelled`.
pub(crate) async fn release(
    subject: &str,
    handle: Box<dyn ReplyHandle>,
) {
    match handle.unsubscribe().await {
        Ok(()) => debug!(subject, "Subscription cancelled"),
        Err(err) => log_error("Unsubscribe failed", &err),
    }
}

impl fmt::Debug for TransientSubscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TransientSubscription")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .field("state", &self.state())
            .field("degraded", &self.degraded)
            .finish()
    }
}
