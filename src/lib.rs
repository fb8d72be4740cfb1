/// HTTP routes, handlers and wire types.
pub mod api;
/// Startup banner.
pub mod banner;
/// Broker connection trait and its NATS and in-memory backends.
pub mod broker;
/// Settings loading: defaults, TOML file, environment, CLI.
pub mod config;
/// Error types of the bridge core.
pub mod error;
/// Transient subscriptions and their TTL-driven expiry.
pub mod lifecycle;
/// Structured logging (filters, console and file sinks).
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use api::{build_router, ApiError, AppState};
pub use broker::{connect, BrokerConnection, MemoryBroker, Message, NatsBroker, ReplyHandle};
pub use config::{BodyPolicy, BrokerBackend, Cli, Settings};
pub use error::{BridgeError, BridgeResult};
pub use lifecycle::{
    RequestBridge, SubscriptionManager, SubscriptionState, TransientSubscription,
};
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
