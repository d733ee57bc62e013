// ── Core error types ──
//
// Policy-facing errors from gatelink-core. Consumers never see raw HTTP
// detail; the `From<gatelink_api::Error>` impl translates wire-layer
// failures into domain variants. Nothing here is fatal by design — every
// failure degrades to "retry on a later tick" or "stay unauthenticated".

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The network link is down; nothing can be attempted until the link
    /// monitor reports it back.
    #[error("network link is down")]
    LinkDown,

    /// The backend rejected the device token or pair code.
    #[error("authentication rejected by the backend")]
    AuthenticationRejected,

    /// The token store failed to persist or clear the token.
    #[error("token store error: {message}")]
    TokenStore { message: String },

    /// Transient backend or transport failure; retry later.
    #[error("backend request failed: {message}")]
    Backend { message: String },

    /// Invalid configuration (bad URL, unusable TLS setup).
    #[error("configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<gatelink_api::Error> for CoreError {
    fn from(err: gatelink_api::Error) -> Self {
        match err {
            gatelink_api::Error::Unauthorized => CoreError::AuthenticationRejected,
            gatelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            gatelink_api::Error::Tls(message) => CoreError::Config {
                message: format!("TLS error: {message}"),
            },
            other => CoreError::Backend {
                message: other.to_string(),
            },
        }
    }
}
