pub mod broker;
pub mod config;

// Re-export every error type so callers can use `bridge_error::BrokerError`.
pub use broker::*;
pub use config::*;
