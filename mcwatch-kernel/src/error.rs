//! Error taxonomy of the watcher.
//!
//! `ProbeError` never leaves the prober: it is folded into a
//! `ProbeFailure` there. `DeliveryError` is logged and dropped by the poll
//! loop. `ConfigError` is fatal at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("no answer within {0} ms")]
    Timeout(u128),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("invalid status payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("discord request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("discord answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid interaction public key")]
    InvalidPublicKey,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Discord(#[from] DiscordError),
    #[error("mqtt publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("could not encode status event: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
