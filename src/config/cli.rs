use std::path::PathBuf;

use clap::Parser;

use super::BrokerBackend;

/// Command-line flags of the bridge server.
///
/// Every flag is optional and overrides the matching setting loaded from the
/// file and the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "pubsub-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "HTTP bridge to a publish/subscribe broker", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(
        short,
        long,
        env = "BRIDGE_CONFIG",
        value_name = "FILE",
        help = "TOML configuration file"
    )]
    pub config: Option<PathBuf>,
    /// HTTP listen address
    #[arg(
        short,
        long,
        value_name = "ADDR",
        help = "HTTP listen address, e.g. 0.0.0.0:4444"
    )]
    pub listen: Option<String>,
    /// Broker backend
    #[arg(long, value_enum, help = "Broker backend to connect to")]
    pub broker_backend: Option<BrokerBackend>,
    /// Log level or filter directive
    #[arg(long, value_name = "LEVEL", help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "pubsub-bridge",
            "--config",
            "bridge.toml",
            "--listen",
            "127.0.0.1:8080",
            "--broker-backend",
            "memory",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("bridge.toml")));
        assert_eq!(cli.listen.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(cli.broker_backend, Some(BrokerBackend::Memory));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["pubsub-bridge", "--broker-backend", "kafka"]).is_err());
    }
}
