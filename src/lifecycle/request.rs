use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::debug;

use crate::{
    broker::{BrokerConnection, Message},
    error::BridgeResult,
};

/// Synchronous request/response over the shared broker connection.
///
/// Completes (reply or error) before returning; nothing runs in the
/// background. No-responder and timeout outcomes surface as
/// [`BridgeError::ServiceUnavailable`](crate::error::BridgeError::ServiceUnavailable).
#[derive(Clone)]
pub struct RequestBridge {
    broker: Arc<dyn BrokerConnection>,
    timeout: Duration,
}

impl RequestBridge {
    pub fn new(
        broker: Arc<dyn BrokerConnection>,
        timeout: Duration,
    ) -> Self {
        Self { broker, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn request(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> BridgeResult<Message> {
        let reply = self.broker.request(subject, payload, self.timeout).await?;
        debug!(subject, bytes = reply.payload.len(), "Reply received");
        Ok(reply)
    }
}
