use std::{borrow::Cow, sync::Arc};

use bytes::Bytes;

/// A message travelling through a broker backend.
///
/// `reply` carries the subject a responder should answer on; it is set for
/// request/response exchanges only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: Arc<str>,
    pub reply: Option<Arc<str>>,
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        subject: impl Into<Arc<str>>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            payload: payload.into(),
        }
    }

    /// Attaches a reply subject.
    pub fn with_reply(
        mut self,
        reply: impl Into<Arc<str>>,
    ) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Payload as text; invalid UTF-8 sequences are replaced.
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
