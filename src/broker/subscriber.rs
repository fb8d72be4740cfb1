use std::sync::Arc;

use tokio::sync::broadcast;

use super::Message;
use crate::error::RecvError;

/// Subscription to one subject of the in-process broker.
///
/// Wraps the `broadcast::Receiver` so callers never touch it directly.
/// Dropping the subscription unsubscribes.
pub struct Subscription {
    /// Subject this subscription listens on.
    pub subject: Arc<str>,
    /// Receiver of incoming messages.
    pub(crate) inner: broadcast::Receiver<Message>,
}

impl Subscription {
    /// Waits for the next message.
    ///
    /// # Returns
    /// - `Ok(Message)` when a message arrives
    /// - `Err(RecvError::Closed)` when the subject was removed from the broker
    /// - `Err(RecvError::Lagged(n))` when the receiver fell `n` messages behind
    pub async fn recv(&mut self) -> Result<Message, RecvError> {
        self.inner.recv().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use bytes::Bytes;
    use tokio::{sync::broadcast, time::timeout};

    use super::*;

    fn subscription(
        subject: &str,
        capacity: usize,
    ) -> (broadcast::Sender<Message>, Subscription) {
        let (tx, rx) = broadcast::channel(capacity);
        let sub = Subscription {
            subject: Arc::from(subject),
            inner: rx,
        };
        (tx, sub)
    }

    #[tokio::test]
    async fn test_recv_returns_sent_message() {
        let (tx, mut sub) = subscription("orders", 4);
        tx.send(Message::new("orders", Bytes::from_static(b"one")))
            .unwrap();

        let msg = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timed out")
            .expect("no message");
        assert_eq!(&*msg.subject, "orders");
        assert_eq!(msg.payload, Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_recv_after_sender_dropped_is_closed() {
        let (tx, mut sub) = subscription("gone", 4);
        drop(tx);
        assert_eq!(sub.recv().await.unwrap_err(), RecvError::Closed);
    }

    /// Dropping the subscription decrements the receiver count.
    #[test]
    fn test_drop_detaches_receiver() {
        let (tx, sub) = subscription("foo", 4);
        assert_eq!(tx.receiver_count(), 1);
        drop(sub);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_skipped_count() {
        let (tx, mut sub) = subscription("lag", 1);
        tx.send(Message::new("lag", Bytes::from_static(b"1")))
            .unwrap();
        tx.send(Message::new("lag", Bytes::from_static(b"2")))
            .unwrap();

        assert_eq!(sub.recv().await.unwrap_err(), RecvError::Lagged(1));
        assert_eq!(sub.recv().await.unwrap().payload, Bytes::from_static(b"2"));
    }
}
