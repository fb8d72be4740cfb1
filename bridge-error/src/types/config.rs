use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Errors raised while loading or validating service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Source could not be read or deserialized
    Load { reason: String },
    /// A value is present but unusable
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "Failed to load configuration: {reason}"),
            Self::Invalid { key, reason } => {
                write!(f, "Invalid configuration value for '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidConfig
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
