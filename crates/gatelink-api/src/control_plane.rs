// Control-plane HTTP client.
//
// Three one-shot request/response operations against the cloud backend:
// pair-code exchange, token validation + device-info fetch, and regional
// gateway assignment. Every response uses the `{ "data": ... }` envelope;
// this module strips it before the caller sees anything.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Header carrying the device bearer token.
pub const DEVICE_TOKEN_HEADER: &str = "DeviceToken";

// ── Response types ───────────────────────────────────────────────────

/// Device identity returned by the token-validation call.
///
/// Consumed only for logging and registration by external collaborators;
/// the session core keeps none of it.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    /// Controllable endpoints attached to this device.
    #[serde(rename = "shockers", default)]
    pub endpoints: Vec<EndpointInfo>,
}

/// One controllable endpoint attached to the device.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointInfo {
    pub id: String,
    #[serde(rename = "rfId")]
    pub rf_id: u16,
    pub model: u8,
}

/// Regional gateway assignment. Transient — re-fetched on every
/// reconnection cycle, never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayAssignment {
    /// Hostname of the assigned gateway.
    pub fqdn: String,
    /// Region the gateway serves.
    pub country: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client for the cloud control plane.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ControlPlaneClient {
    /// Create a new client from a [`TransportConfig`].
    ///
    /// `base_url` is the control-plane root, e.g. `https://api.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Use this when you already have a configured client (tests point
    /// this at a mock server).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The control-plane base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Exchange a one-time pair code for a long-lived device token.
    ///
    /// Fails on any non-success status or an empty token in the body.
    pub async fn pair(&self, pair_code: u32) -> Result<SecretString, Error> {
        let url = self.endpoint(&format!("device/pair/{pair_code}"))?;
        debug!(%url, "exchanging pair code");

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let token: String = read_envelope(resp).await?;

        if token.is_empty() {
            return Err(Error::MalformedResponse {
                message: "received empty device token".into(),
            });
        }

        Ok(SecretString::from(token))
    }

    /// Validate the stored token and fetch the device's identity.
    ///
    /// A 401 maps to [`Error::Unauthorized`]; the clear-token policy lives
    /// with the caller.
    pub async fn device_self(&self, token: &SecretString) -> Result<DeviceInfo, Error> {
        let url = self.endpoint("device/self")?;
        debug!(%url, "validating device token");

        let resp = self
            .http
            .get(url)
            .header(DEVICE_TOKEN_HEADER, token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        read_envelope(resp).await
    }

    /// Ask the control plane which regional gateway this device should
    /// connect to.
    pub async fn assign_gateway(&self, token: &SecretString) -> Result<GatewayAssignment, Error> {
        let url = self.endpoint("device/assignGateway")?;
        debug!(%url, "requesting gateway assignment");

        let resp = self
            .http
            .get(url)
            .header(DEVICE_TOKEN_HEADER, token.expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        read_envelope(resp).await
    }
}

// ── Envelope handling ────────────────────────────────────────────────

/// Unwrap the `{ data }` envelope, mapping 401 to [`Error::Unauthorized`]
/// and other non-success statuses to [`Error::Api`].
async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }

    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    let envelope: Envelope<T> =
        serde_json::from_str(&body).map_err(|e| Error::MalformedResponse {
            message: e.to_string(),
        })?;

    Ok(envelope.data)
}
