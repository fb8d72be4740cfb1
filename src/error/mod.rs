pub mod bridge;
pub mod pubsub;

use bridge_error::{ErrorExt, LogLevel};
use tracing::{debug, error, info, warn};

pub use bridge::{BridgeError, BridgeResult};
pub use pubsub::RecvError;

/// Logs `err` at the level its status code calls for.
pub fn log_error<E: ErrorExt>(
    context: &str,
    err: &E,
) {
    let code = err.status_code();
    let kind = err.type_name();
    let retryable = code.is_retryable();
    let detail = err.log_message();

    match code.log_level() {
        LogLevel::Debug => {
            debug!(code = code.code(), %kind, retryable, error = %err, %detail, "{context}")
        }
        LogLevel::Info => {
            info!(code = code.code(), %kind, retryable, error = %err, %detail, "{context}")
        }
        LogLevel::Warn => {
            warn!(code = code.code(), %kind, retryable, error = %err, %detail, "{context}")
        }
        LogLevel::Error => {
            error!(code = code.code(), %kind, retryable, error = %err, %detail, "{context}")
        }
    }
}
