use std::{any::Any, error::Error};

use crate::StatusCode;

/// Extension for library errors (object-safe).
///
/// Gives every error a status code, a client-safe message and a detailed
/// message for logs.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Status used by the HTTP layer and by logs.
    ///
    /// Defaults to [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Returns the error as [`Any`](std::any::Any) for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Message that is safe to show to an HTTP caller.
    ///
    /// Internal errors collapse to `"Internal server error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Detailed message for logs. May contain sensitive data.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Short type name of the error (for logs).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}
