use std::{sync::Arc, time::Duration};

use async_nats::{
    client::RequestErrorKind,
    Client, ConnectOptions, Request, Subscriber,
};
use async_trait::async_trait;
use bridge_error::{BrokerError, BrokerResult};
use bytes::Bytes;
use futures::StreamExt;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

use super::{validate_subject, BrokerConnection, Message, ReplyHandle, CONNECTION_NAME};
use crate::config::BrokerSettings;

/// Broker connection backed by a NATS server.
///
/// `async_nats::Client` is cheap to clone and safe for concurrent use, so the
/// handle adds no locking of its own.
pub struct NatsBroker {
    client: Client,
    /// Server address without credentials, for logs.
    address: String,
}

/// Auto-reply registration on a NATS subject.
///
/// The responder task owns the `Subscriber`; stopping the task unsubscribes.
struct NatsReplyHandle {
    subject: Arc<str>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<BrokerResult<()>>,
}

impl NatsBroker {
    /// Connects and authenticates within `connect_timeout`.
    pub async fn connect(settings: &BrokerSettings) -> BrokerResult<Self> {
        let address = settings.address();
        let mut options = ConnectOptions::new()
            .name(CONNECTION_NAME)
            .connection_timeout(settings.connect_timeout())
            .request_timeout(Some(settings.request_timeout()));
        if !settings.user.is_empty() {
            options = options.user_and_password(settings.user.clone(), settings.password.clone());
        }

        let connect_err = |reason: String| BrokerError::Connect {
            address: address.clone(),
            reason,
        };

        let client = tokio::time::timeout(settings.connect_timeout(), options.connect(&address))
            .await
            .map_err(|_| {
                connect_err(format!(
                    "timed out after {}ms",
                    settings.connect_timeout().as_millis()
                ))
            })?
            .map_err(|err| connect_err(err.to_string()))?;

        debug!(address = %address, "NATS connection established");
        Ok(Self { client, address })
    }
}

#[async_trait]
impl BrokerConnection for NatsBroker {
    async fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> BrokerResult<()> {
        validate_subject(subject)?;
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|err| BrokerError::Publish {
                subject: subject.to_string(),
                reason: err.to_string(),
            })
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> BrokerResult<Message> {
        validate_subject(subject)?;
        let request = Request::new().payload(payload).timeout(Some(timeout));

        match self
            .client
            .send_request(subject.to_string(), request)
            .await
        {
            Ok(msg) => {
                let mut reply = Message::new(msg.subject.as_str(), msg.payload);
                if let Some(reply_to) = msg.reply {
                    reply = reply.with_reply(reply_to.as_str());
                }
                Ok(reply)
            }
            Err(err) => Err(match err.kind() {
                RequestErrorKind::NoResponders => BrokerError::NoResponders {
                    subject: subject.to_string(),
                },
                RequestErrorKind::TimedOut => BrokerError::Timeout {
                    subject: subject.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                },
                RequestErrorKind::Other => BrokerError::Request {
                    subject: subject.to_string(),
                    reason: err.to_string(),
                },
            }),
        }
    }

    async fn subscribe_with_auto_reply(
        &self,
        subject: &str,
        reply_payload: Bytes,
    ) -> BrokerResult<Box<dyn ReplyHandle>> {
        validate_subject(subject)?;
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|err| BrokerError::Subscribe {
                subject: subject.to_string(),
                reason: err.to_string(),
            })?;

        let subject: Arc<str> = Arc::from(subject);
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_responder(
            self.client.clone(),
            subscriber,
            subject.clone(),
            reply_payload,
            stop_rx,
        ));

        debug!(subject = %subject, "Auto-reply responder registered");
        Ok(Box::new(NatsReplyHandle {
            subject,
            stop,
            task,
        }))
    }

    async fn drain(&self) -> BrokerResult<()> {
        self.client
            .drain()
            .await
            .map_err(|err| BrokerError::Drain {
                reason: err.to_string(),
            })
    }

    fn servers(&self) -> Vec<String> {
        vec![self.address.clone()]
    }

    fn backend_name(&self) -> &'static str {
        "nats"
    }
}

#[async_trait]
impl ReplyHandle for NatsReplyHandle {
    fn subject(&self) -> &str {
        &self.subject
    }

    async fn unsubscribe(self: Box<Self>) -> BrokerResult<()> {
        let Self {
            subject,
            stop,
            task,
        } = *self;
        let _ = stop.send(());
        match task.await {
            Ok(result) => result,
            Err(err) => Err(BrokerError::Unsubscribe {
                subject: subject.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Answers every message carrying a reply subject with `reply_payload` until
/// stopped or until the connection closes the subscription.
async fn run_responder(
    client: Client,
    mut subscriber: Subscriber,
    subject: Arc<str>,
    reply_payload: Bytes,
    mut stop: oneshot::Receiver<()>,
) -> BrokerResult<()> {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            next = subscriber.next() => match next {
                Some(msg) => {
                    let Some(reply) = msg.reply else {
                        continue;
                    };
                    if let Err(err) = client.publish(reply, reply_payload.clone()).await {
                        warn!(subject = %subject, error = %err, "Auto-reply publish failed");
                    }
                }
                None => {
                    debug!(subject = %subject, "Subscription closed by connection");
                    return Ok(());
                }
            },
        }
    }

    subscriber
        .unsubscribe()
        .await
        .map_err(|err| BrokerError::Unsubscribe {
            subject: subject.to_string(),
            reason: err.to_string(),
        })?;
    debug!(subject = %subject, "Auto-reply responder stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrokerBackend, BrokerSettings};

    /// Nothing listens on port 1, so connect fails with a `Connect` error
    /// that names the address but hides credentials from the client.
    #[tokio::test]
    async fn test_connect_unreachable_server_fails() {
        let settings = BrokerSettings {
            backend: BrokerBackend::Nats,
            host: "127.0.0.1".into(),
            port: 1,
            user: "bridge".into(),
            password: "secret".into(),
            connect_timeout_ms: 500,
            ..Default::default()
        };

        let err = match NatsBroker::connect(&settings).await {
            Ok(_) => panic!("connect to a closed port must fail"),
            Err(err) => err,
        };
        match &err {
            BrokerError::Connect { address, .. } => {
                assert_eq!(address, "nats://127.0.0.1:1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
