//! Station provider client
//!
//! REST access to station metadata and stored device observations, plus
//! the streaming [`Subscription`] that delivers live observations over a
//! websocket.

pub mod rest;
pub mod session;
pub mod wire;

pub use rest::*;
pub use session::*;
pub use wire::{Station, StationsEnvelope};

use thiserror::Error;

/// REST client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Provider returned error code {code}: {message}")]
    Status { code: i64, message: String },

    #[error("Unexpected response: {0}")]
    Validation(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Streaming session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Connect failed: {0}")]
    Connect(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("{state}: received message type {received}, expecting {expected}")]
    Handshake {
        state: SessionState,
        expected: &'static str,
        received: String,
    },

    #[error("{state}: {reason}")]
    Protocol { state: SessionState, reason: String },

    #[error("{state}: connection closed by provider")]
    Closed { state: SessionState },

    #[error("{state}: websocket error: {source}")]
    Transport {
        state: SessionState,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cancelled by shutdown")]
    Cancelled,
}

impl SessionError {
    /// Whether another connection attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SessionError::Url(_) | SessionError::Encode(_) | SessionError::Cancelled
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
