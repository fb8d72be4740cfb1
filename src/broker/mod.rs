//! Broker connection layer.
//!
//! - `message`: message type shared by every backend.
//! - `subscriber`: in-process subscription over a broadcast channel.
//! - `memory`: in-process broker, used for local runs and tests.
//! - `nats`: NATS backend over `async-nats`.
//!
//! The rest of the service only sees [`BrokerConnection`] and
//! [`ReplyHandle`].

pub mod memory;
pub mod message;
pub mod nats;
pub mod subscriber;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bridge_error::{BrokerError, BrokerResult};
use bytes::Bytes;
use tracing::info;

pub use memory::MemoryBroker;
pub use message::Message;
pub use nats::NatsBroker;
pub use subscriber::Subscription;

use crate::config::{BrokerBackend, BrokerSettings};

/// Name announced to the broker on connect.
pub const CONNECTION_NAME: &str = "pubsub-bridge";

/// High-level contract of one broker connection.
///
/// Implementations are internally synchronized and are shared across all
/// HTTP handlers as `Arc<dyn BrokerConnection>`.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Fire-and-forget publish.
    async fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> BrokerResult<()>;

    /// Synchronous request with a bounded wait.
    ///
    /// Fails with [`BrokerError::NoResponders`] or [`BrokerError::Timeout`]
    /// when nobody answers.
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> BrokerResult<Message>;

    /// Registers a responder answering every message on `subject` that
    /// carries a reply subject with `reply_payload`.
    ///
    /// Returns once the broker accepted the registration; the responder runs
    /// on its own task.
    async fn subscribe_with_auto_reply(
        &self,
        subject: &str,
        reply_payload: Bytes,
    ) -> BrokerResult<Box<dyn ReplyHandle>>;

    /// Flushes in-flight messages and releases the connection.
    async fn drain(&self) -> BrokerResult<()>;

    /// Addresses of the servers this connection talks to.
    fn servers(&self) -> Vec<String>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Live auto-reply registration returned by
/// [`BrokerConnection::subscribe_with_auto_reply`].
#[async_trait]
pub trait ReplyHandle: Send {
    fn subject(&self) -> &str;

    /// Stops the responder and removes the subscription from the broker.
    ///
    /// Must not panic when the connection is already drained.
    async fn unsubscribe(self: Box<Self>) -> BrokerResult<()>;
}

/// Rejects subjects the broker would refuse: empty, or containing
/// whitespace.
pub fn validate_subject(subject: &str) -> BrokerResult<()> {
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(BrokerError::InvalidSubject {
            subject: subject.to_string(),
        });
    }
    Ok(())
}

/// Opens the configured backend.
pub async fn connect(settings: &BrokerSettings) -> BrokerResult<Arc<dyn BrokerConnection>> {
    let broker: Arc<dyn BrokerConnection> = match settings.backend {
        BrokerBackend::Nats => Arc::new(NatsBroker::connect(settings).await?),
        BrokerBackend::Memory => Arc::new(MemoryBroker::new(settings.channel_capacity)),
    };

    info!(
        backend = broker.backend_name(),
        servers = ?broker.servers(),
        "Broker connected"
    );

    Ok(broker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("orders.created").is_ok());
        assert!(validate_subject("_INBOX.abc").is_ok());
        assert!(matches!(
            validate_subject(""),
            Err(BrokerError::InvalidSubject { .. })
        ));
        assert!(validate_subject("with space").is_err());
        assert!(validate_subject("tab\there").is_err());
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let settings = BrokerSettings {
            backend: BrokerBackend::Memory,
            ..Default::default()
        };
        let broker = connect(&settings).await.unwrap();
        assert_eq!(broker.backend_name(), "memory");
        assert_eq!(broker.servers(), vec!["memory://local".to_string()]);
    }
}
