// ── Runtime configuration ──
//
// Describes *how* the manager talks to the cloud: control-plane URL,
// identity strings, TLS policy, timing. Built by the embedding
// application and handed in — core never reads config files.

use std::time::Duration;

use gatelink_api::TlsMode;
use url::Url;

/// Configuration for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Control-plane base URL (e.g., `https://api.example.com/`).
    pub api_url: Url,

    /// Firmware version string sent on the gateway session handshake.
    pub firmware_version: String,

    /// TLS verification policy for both the control plane and the
    /// gateway session. Defaults to [`TlsMode::DangerAcceptInvalid`] to
    /// suit devices without a trust store; see the `TlsMode` docs before
    /// shipping that default anywhere that matters.
    pub tls: TlsMode,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// Minimum spacing between gateway discovery attempts, measured from
    /// the start of each attempt regardless of its outcome.
    pub discovery_cooldown: Duration,
}

impl ManagerConfig {
    /// Config with default timing (30 s HTTP timeout, 20 s discovery
    /// cooldown) and the default TLS policy.
    pub fn new(api_url: Url, firmware_version: impl Into<String>) -> Self {
        Self {
            api_url,
            firmware_version: firmware_version.into(),
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            discovery_cooldown: Duration::from_millis(20_000),
        }
    }
}
