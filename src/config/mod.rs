//! Service configuration: built-in defaults, an optional TOML file,
//! `BRIDGE__*` environment variables and command-line flags, in that order.

pub mod cli;
pub mod settings;

pub use cli::Cli;
pub use settings::{
    BodyPolicy, BrokerBackend, BrokerSettings, HttpSettings, LifecycleSettings, Settings,
    ENV_PREFIX,
};
