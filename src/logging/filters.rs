use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Level filter of the whole subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured directive is used,
/// falling back to `info` if it does not parse.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = config.build_filter_directive();
    EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("Invalid log filter directive '{directive}': {err}; falling back to 'info'");
        EnvFilter::new("info")
    })
}
