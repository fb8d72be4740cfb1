use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "extras")]
use strum_macros::{AsRefStr, EnumIter};

/// Status codes used to categorise errors.
///
/// # Ranges:
/// - 1xxx: General errors (including request shape and configuration)
/// - 2xxx: Data errors (subjects)
/// - 6xxx: Broker / network
/// - 8xxx: Protocol limits
///
/// `num_enum::TryFromPrimitive` gives a native `TryFrom<u32>`, `strum` adds
/// `AsRefStr`/`EnumIter` behind the `extras` feature.
#[cfg_attr(feature = "extras", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx: General ===
    Internal = 1003,
    InvalidArgs = 1004,
    InvalidMethod = 1006,
    InvalidConfig = 1007,

    // === 2xxx: Data ===
    InvalidSubject = 2001,

    // === 6xxx: Broker / network ===
    ConnectionClosed = 6001,
    Timeout = 6002,
    ProtocolError = 6003,
    ConnectionFailed = 6004,
    NoResponders = 6005,
    PublishFailed = 6006,
    SubscribeFailed = 6007,
    ServiceUnavailable = 6008,

    // === 8xxx: Protocol ===
    SizeLimit = 8002,
}

/// Severity at which an error with a given code is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Numeric representation of the status code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Returns `true` when retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::NoResponders
                | Self::ConnectionFailed
                | Self::ServiceUnavailable
        )
    }

    /// Recommended log level for this code.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::InvalidMethod => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidSubject | Self::SizeLimit => LogLevel::Info,
            Self::Internal | Self::ConnectionFailed | Self::InvalidConfig => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// HTTP status matching this code.
    ///
    /// Broker-side unavailability (`NoResponders`, `Timeout`, a closed
    /// connection) is a 5xx outcome, never a 4xx one.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidMethod => 404,
            Self::InvalidArgs | Self::InvalidSubject => 400,
            Self::SizeLimit => 413,
            Self::NoResponders
            | Self::Timeout
            | Self::ConnectionClosed
            | Self::ServiceUnavailable => 503,
            _ => 500,
        }
    }

    /// Machine-readable code placed in the `error` field of HTTP error
    /// envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidMethod => "invalid_method",
            Self::InvalidArgs | Self::InvalidSubject => "invalid_params",
            Self::SizeLimit => "payload_too_large",
            Self::NoResponders | Self::Timeout | Self::ServiceUnavailable => {
                "service_unavailable"
            }
            _ => "internal",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Common trait impls for StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "extras")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "extras"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
