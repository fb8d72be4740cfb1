use std::{fmt, net::SocketAddr, path::Path, time::Duration};

use bridge_error::ConfigError;
use clap::ValueEnum;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::Cli;
use crate::logging::LoggingConfig;

/// Prefix of the environment variables read by [`Settings::load`], e.g.
/// `BRIDGE__BROKER__HOST`.
pub const ENV_PREFIX: &str = "BRIDGE";

/// How `publish-message` and `reply` treat a body that is not valid JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPolicy {
    /// Proceed with empty `subject` and `message`
    #[default]
    Lenient,
    /// Reject with 400 `invalid_params`, like the other routes
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    #[default]
    Nats,
    /// In-process broker, no external server needed
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub listen_address: String,
    pub request_timeout_ms: u64,
    pub body_limit_bytes: usize,
    pub body_policy: BodyPolicy,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub backend: BrokerBackend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout_ms: u64,
    /// Wait bound of `request-reply`
    pub request_timeout_ms: u64,
    /// Per-subject buffer of the memory backend
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    /// Lifetime of every transient subscription batch
    pub subscription_ttl_secs: u64,
    /// How long shutdown waits for pending expiries
    pub shutdown_grace_ms: u64,
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub broker: BrokerSettings,
    pub lifecycle: LifecycleSettings,
    pub logging: LoggingConfig,
}

impl HttpSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address.parse().map_err(|err| {
            ConfigError::invalid(
                "http.listen_address",
                format!("'{}': {err}", self.listen_address),
            )
        })
    }
}

impl BrokerSettings {
    /// Server URL without credentials.
    pub fn address(&self) -> String {
        format!("nats://{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl LifecycleSettings {
    pub fn subscription_ttl(&self) -> Duration {
        Duration::from_secs(self.subscription_ttl_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Settings {
    /// Resolves the final settings for `cli`: file and environment first,
    /// command-line overrides on top, validation last.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut settings = Self::load(cli.config.as_deref())?;
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Loads defaults, then `path` (when given), then `BRIDGE__*` variables.
    ///
    /// The result is not validated; see [`Settings::from_cli`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Config::try_from(&Settings::default()).map_err(load_error)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?
            .try_deserialize()
            .map_err(load_error)?;

        Ok(settings)
    }

    /// Applies command-line overrides.
    pub fn apply_cli(
        &mut self,
        cli: &Cli,
    ) {
        if let Some(listen) = &cli.listen {
            self.http.listen_address = listen.clone();
        }
        if let Some(backend) = cli.broker_backend {
            self.broker.backend = backend;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.socket_addr()?;
        if self.http.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "http.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.http.body_limit_bytes == 0 {
            return Err(ConfigError::invalid(
                "http.body_limit_bytes",
                "must be greater than zero",
            ));
        }

        if self.broker.backend == BrokerBackend::Nats {
            if self.broker.host.trim().is_empty() {
                return Err(ConfigError::invalid("broker.host", "must not be empty"));
            }
            if self.broker.port == 0 {
                return Err(ConfigError::invalid("broker.port", "must be non-zero"));
            }
        }
        if self.broker.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "broker.connect_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.broker.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "broker.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.broker.channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "broker.channel_capacity",
                "must be greater than zero",
            ));
        }

        if self.lifecycle.subscription_ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "lifecycle.subscription_ttl_secs",
                "must be greater than zero",
            ));
        }

        self.logging
            .validate()
            .map_err(|reason| ConfigError::invalid("logging", reason))
    }
}

fn load_error(err: config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:4444".to_string(),
            request_timeout_ms: 10_000,
            body_limit_bytes: 1 << 20,
            body_policy: BodyPolicy::Lenient,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Nats,
            host: "localhost".to_string(),
            port: 4222,
            user: String::new(),
            password: String::new(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 1_000,
            channel_capacity: 128,
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            subscription_ttl_secs: 30,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl fmt::Debug for BrokerSettings {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{env, io::Write};

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use super::*;

    fn clear_env() {
        for (key, _) in env::vars() {
            if key.starts_with("BRIDGE__") {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.http.listen_address, "0.0.0.0:4444");
        assert_eq!(settings.http.body_policy, BodyPolicy::Lenient);
        assert_eq!(settings.broker.address(), "nats://localhost:4222");
        assert_eq!(settings.broker.request_timeout(), Duration::from_secs(1));
        assert_eq!(settings.broker.connect_timeout(), Duration::from_secs(10));
        assert_eq!(
            settings.lifecycle.subscription_ttl(),
            Duration::from_secs(30)
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        clear_env();
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.http.listen_address, "0.0.0.0:4444");
        assert_eq!(settings.broker.port, 4222);
    }

    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[http]
listen_address = "127.0.0.1:9000"
body_policy = "strict"

[broker]
backend = "memory"
request_timeout_ms = 250

[lifecycle]
subscription_ttl_secs = 5
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.http.listen_address, "127.0.0.1:9000");
        assert_eq!(settings.http.body_policy, BodyPolicy::Strict);
        assert_eq!(settings.broker.backend, BrokerBackend::Memory);
        assert_eq!(settings.broker.request_timeout_ms, 250);
        // untouched keys keep their defaults
        assert_eq!(settings.broker.host, "localhost");
        assert_eq!(settings.lifecycle.subscription_ttl_secs, 5);
        assert_eq!(settings.lifecycle.shutdown_grace_ms, 5_000);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[broker]\nport = 5000").unwrap();

        env::set_var("BRIDGE__BROKER__PORT", "6000");
        env::set_var("BRIDGE__BROKER__HOST", "nats.internal");
        let result = Settings::load(Some(file.path()));
        clear_env();

        let settings = result.unwrap();
        assert_eq!(settings.broker.port, 6000);
        assert_eq!(settings.broker.host, "nats.internal");
    }

    #[test]
    #[serial]
    fn test_load_rejects_invalid_values() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[lifecycle]\nsubscription_ttl_secs = 0").unwrap();

        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = Settings::from_cli(&cli).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "lifecycle.subscription_ttl_secs"));
    }

    /// A bad listen address in the file is fine when `--listen` replaces it.
    #[test]
    #[serial]
    fn test_cli_override_fixes_invalid_file_value() {
        clear_env();
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nlisten_address = \"not-an-address\"").unwrap();

        let mut cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(Settings::from_cli(&cli).is_err());

        cli.listen = Some("127.0.0.1:8080".into());
        let settings = Settings::from_cli(&cli).unwrap();
        assert_eq!(settings.http.listen_address, "127.0.0.1:8080");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_load_error() {
        clear_env();
        let err = Settings::load(Some(Path::new("/nonexistent/bridge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn test_validate_listen_address() {
        let mut settings = Settings::default();
        settings.http.listen_address = "not-an-address".into();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("http.listen_address"));
    }

    /// The memory backend needs no host or port.
    #[test]
    fn test_validate_memory_backend_ignores_host() {
        let mut settings = Settings::default();
        settings.broker.backend = BrokerBackend::Memory;
        settings.broker.host.clear();
        settings.broker.port = 0;
        assert!(settings.validate().is_ok());

        settings.broker.backend = BrokerBackend::Nats;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_apply_cli_overrides() {
        let mut settings = Settings::default();
        let cli = Cli {
            listen: Some("127.0.0.1:1234".into()),
            broker_backend: Some(BrokerBackend::Memory),
            log_level: Some("debug".into()),
            ..Default::default()
        };
        settings.apply_cli(&cli);

        assert_eq!(settings.http.listen_address, "127.0.0.1:1234");
        assert_eq!(settings.broker.backend, BrokerBackend::Memory);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_debug_redacts_password() {
        let broker = BrokerSettings {
            password: "hunter2".into(),
            ..Default::default()
        };
        let printed = format!("{broker:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
