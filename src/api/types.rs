//! Request and response bodies of the HTTP API.
//!
//! Field names are part of the wire format and match what existing clients
//! of the bridge send and expect.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{broker::Message, lifecycle::TransientSubscription};

/// `{subject, message}` body of the single-subject routes.
///
/// Missing fields decode as empty strings; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BodyParams {
    #[serde(alias = "Subject")]
    pub subject: String,
    #[serde(alias = "Message")]
    pub message: String,
}

/// `{subjects: [{subject, message}, …]}` body of `queue-group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubjectArray {
    #[serde(alias = "Subjects")]
    pub subjects: Vec<BodyParams>,
}

/// Error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Success envelope: everything sits under `message`.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub message: T,
}

#[derive(Debug, Serialize)]
pub struct PublishResult {
    pub message: &'static str,
    pub text: String,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResult {
    pub message: &'static str,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct RequestReplyResult {
    pub message: BrokerMessageView,
    pub subject: String,
    /// Responder payload as text
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct QueueGroupResult {
    pub message: &'static str,
    pub elements: Vec<SubscriptionView>,
}

/// Broker message as exposed to HTTP callers. `Data` is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BrokerMessageView {
    pub subject: String,
    pub reply: String,
    pub header: Option<()>,
    pub data: String,
    pub sub: Option<()>,
}

/// One created subscription inside `elements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionView {
    pub subject: String,
    /// Always empty: bridge subscriptions never join a broker queue group
    pub queue: String,
}

impl From<&Message> for BrokerMessageView {
    fn from(msg: &Message) -> Self {
        Self {
            subject: msg.subject.to_string(),
            reply: msg.reply.as_deref().unwrap_or_default().to_string(),
            header: None,
            data: STANDARD.encode(&msg.payload),
            sub: None,
        }
    }
}

impl From<&TransientSubscription> for SubscriptionView {
    fn from(sub: &TransientSubscription) -> Self {
        Self {
            subject: sub.subject().to_string(),
            queue: String::new(),
        }
    }
}
