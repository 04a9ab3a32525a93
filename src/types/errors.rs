//! Error types for MAGI.
//!
//! Per-provider failures are *data* (see [`ProviderErrorKind`]); only
//! request-level failures surface as [`MagiError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::responses::ProviderResult;

/// Default result type for MAGI.
pub type MagiResult<T> = Result<T, MagiError>;

/// Request-level and infrastructure errors.
#[derive(Error, Debug)]
pub enum MagiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Every dispatched provider failed or returned empty output.
    #[error("{message}")]
    AllProvidersFailed {
        message: String,
        results: Vec<ProviderResult>,
    },

    #[error("judge_failed: {0}")]
    Judge(String),

    #[error("MCP server error: {0}")]
    McpServer(String),

    #[cfg(feature = "cli")]
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

impl MagiError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a bad-request error.
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// HTTP-equivalent status class of the error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::UnknownProvider(_) => 400,
            Self::AllProvidersFailed { .. } | Self::Judge(_) => 502,
            _ => 500,
        }
    }

    /// Provider results carried by the error, if any.
    pub fn results(&self) -> Option<&[ProviderResult]> {
        match self {
            Self::AllProvidersFailed { results, .. } => Some(results),
            _ => None,
        }
    }
}

/// Why a single provider call produced no usable answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credential missing or provider misconfigured; no network call made.
    Configuration,
    /// Daily quota exhausted; no network call made.
    Quota,
    /// Network failure or non-2xx upstream status.
    Transport,
    /// The per-call deadline elapsed and the request was cancelled.
    Timeout,
    /// 2xx response whose body does not match the vendor shape.
    Shape,
}

impl ProviderErrorKind {
    /// HTTP-equivalent status class.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Timeout => 504,
            Self::Configuration | Self::Quota => 400,
            Self::Transport | Self::Shape => 500,
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Quota => write!(f, "quota"),
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::Shape => write!(f, "shape"),
        }
    }
}
