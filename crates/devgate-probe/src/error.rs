use std::time::Duration;

/// Error types for the probe and channel checks
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Login failed with status {status}: {body}")]
    LoginRejected { status: u16, body: String },

    #[error("Login response did not contain an access token")]
    MissingAccessToken,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Timed out after {timeout:?} connecting to {url}")]
    ConnectTimeout { url: String, timeout: Duration },

    #[error("Failed to encode message: {0}")]
    Json(#[from] serde_json::Error),
}
