use std::any::Any;

use bridge_error::{BrokerError, ErrorExt, StatusCode};
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced by the bridge core to the HTTP layer.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Nobody answered a request in time.
    #[error("{0}")]
    ServiceUnavailable(BrokerError),

    /// Any other broker failure.
    #[error(transparent)]
    Broker(BrokerError),
}

impl From<BrokerError> for BridgeError {
    fn from(err: BrokerError) -> Self {
        if err.is_unavailable() {
            Self::ServiceUnavailable(err)
        } else {
            Self::Broker(err)
        }
    }
}

impl ErrorExt for BridgeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable(_) => StatusCode::ServiceUnavailable,
            Self::Broker(err) => err.status_code(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::ServiceUnavailable(err) | Self::Broker(err) => err.client_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_responders_becomes_service_unavailable() {
        let err: BridgeError = BrokerError::NoResponders {
            subject: "svc".into(),
        }
        .into();
        assert!(matches!(err, BridgeError::ServiceUnavailable(_)));
        assert_eq!(err.status_code().http_status(), 503);
        assert_eq!(err.to_string(), "no responders available for request");
    }

    #[test]
    fn test_timeout_becomes_service_unavailable() {
        let err: BridgeError = BrokerError::Timeout {
            subject: "svc".into(),
            timeout_ms: 5,
        }
        .into();
        assert!(matches!(err, BridgeError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_other_broker_errors_keep_their_code() {
        let err: BridgeError = BrokerError::Closed.into();
        assert!(matches!(err, BridgeError::Broker(_)));
        assert_eq!(err.status_code(), StatusCode::ConnectionClosed);
    }

    #[test]
    fn test_client_message_comes_from_broker_error() {
        let err: BridgeError = BrokerError::Connect {
            address: "nats://broker:4222".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(err.client_message(), "Broker unavailable");
    }
}
