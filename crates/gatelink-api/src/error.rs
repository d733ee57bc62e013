use thiserror::Error;

/// Top-level error type for the `gatelink-api` crate.
///
/// Covers every failure mode of the wire layer: control-plane HTTP calls,
/// TLS setup, and the gateway WebSocket. `gatelink-core` maps these into
/// its own policy-aware variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected the device token (HTTP 401). The caller owns
    /// the clear-token policy; this crate only reports the rejection.
    #[error("Device token rejected by the backend")]
    Unauthorized,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Control plane ───────────────────────────────────────────────
    /// Non-success HTTP status from the control plane (other than 401).
    #[error("Control plane error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape (missing `data`,
    /// missing assignment fields, empty token, ...).
    #[error("Malformed control plane response: {message}")]
    MalformedResponse { message: String },

    // ── Gateway session ─────────────────────────────────────────────
    /// WebSocket connection or protocol failure.
    #[error("Gateway session error: {0}")]
    WebSocket(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on a
    /// later tick (as opposed to an auth rejection or config problem).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            Self::WebSocket(_) => true,
            _ => false,
        }
    }
}
