// ── Session manager ──
//
// Owns the device's whole relationship with the cloud gateway: pairing,
// token validation, gateway discovery, the persistent session, and
// observer fan-out. Driven by an external periodic tick (`update`), with
// every network call async and timeout-bounded so the driving loop is
// never blocked. All shared state lives in this owned struct; link events
// are delivered through a method on the same owner, which serializes flag
// mutation and session teardown by construction.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use gatelink_api::control_plane::DeviceInfo;
use gatelink_api::frame::SessionMessage;
use gatelink_api::session::SessionEvent;
use gatelink_api::{
    ConnectionState, ControlPlaneClient, GatewaySession, InboundCommand, TransportConfig,
};

use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::observers::{ConnectedChangedHandler, ObserverHandle, ObserverRegistry};
use crate::token_store::TokenStore;
use crate::traits::{CaptivePortal, CommandSink, LinkEvent};

// ── Connection flags ─────────────────────────────────────────────────

/// Link and authentication state.
///
/// `authenticated` is only set after a successful token validation or
/// pairing. Link loss clears both: the device must re-validate once the
/// link returns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ConnectionFlags {
    has_link: bool,
    authenticated: bool,
}

// ── SessionManager ───────────────────────────────────────────────────

/// Orchestrates the gateway session lifecycle for one device.
///
/// Holds zero-or-one [`GatewaySession`]; bootstraps a new one when link
/// and token are available, pumps the existing one, and attempts
/// discovery + reconnect (cooldown-gated) when the session is idle.
pub struct SessionManager {
    config: ManagerConfig,
    control: ControlPlaneClient,
    token_store: Arc<dyn TokenStore>,
    commands: Arc<dyn CommandSink>,
    captive_portal: Arc<dyn CaptivePortal>,
    observers: ObserverRegistry,
    flags: ConnectionFlags,
    session: Option<GatewaySession>,
    last_discovery_attempt: Option<Instant>,
}

impl SessionManager {
    /// Build a manager. Nothing is contacted until the first
    /// [`update`](Self::update) or [`pair`](Self::pair).
    pub fn new(
        config: ManagerConfig,
        token_store: Arc<dyn TokenStore>,
        commands: Arc<dyn CommandSink>,
        captive_portal: Arc<dyn CaptivePortal>,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let control = ControlPlaneClient::new(config.api_url.clone(), &transport)?;

        Ok(Self {
            config,
            control,
            token_store,
            commands,
            captive_portal,
            observers: ObserverRegistry::new(),
            flags: ConnectionFlags::default(),
            session: None,
            last_discovery_attempt: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// `true` iff an active session exists and is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.state() == ConnectionState::Connected)
    }

    /// `true` iff the device has validated credentials this link session.
    pub fn is_paired(&self) -> bool {
        self.flags.authenticated
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Register a connected-changed observer.
    pub fn register_observer(&mut self, handler: ConnectedChangedHandler) -> ObserverHandle {
        self.observers.register(handler)
    }

    /// Remove a previously registered observer.
    pub fn unregister_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.unregister(handle)
    }

    // ── Link events ──────────────────────────────────────────────────

    /// Apply a link-layer connectivity event.
    ///
    /// Link loss resets both flags and tears down the active session —
    /// authentication does not survive the link.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Up => {
                debug!("link acquired");
                self.flags.has_link = true;
            }
            LinkEvent::Down => {
                debug!("link lost");
                self.flags = ConnectionFlags::default();
                self.session = None;
            }
        }
    }

    // ── Pairing ──────────────────────────────────────────────────────

    /// Exchange a one-time pair code for a device token.
    ///
    /// Requires the link to be up. On success the token is persisted,
    /// the device becomes authenticated, and any existing session is torn
    /// down to force a re-bootstrap. Failure leaves stored state
    /// untouched.
    pub async fn pair(&mut self, pair_code: u32) -> Result<(), CoreError> {
        if !self.flags.has_link {
            return Err(CoreError::LinkDown);
        }

        debug!(pair_code, "attempting to pair");
        let token = self.control.pair(pair_code).await?;
        self.token_store.set(token)?;
        self.flags.authenticated = true;
        self.session = None;
        info!(pair_code, "paired successfully");
        Ok(())
    }

    /// Forget the pairing: clears the authenticated flag, the stored
    /// token, and the active session. The link flag is untouched.
    pub fn unpair(&mut self) -> Result<(), CoreError> {
        self.flags.authenticated = false;
        self.session = None;
        self.token_store.clear()
    }

    /// Tear down the active session and reset all state.
    pub fn shutdown(&mut self) {
        debug!("shutting down session manager");
        self.session = None;
        self.flags = ConnectionFlags::default();
        self.last_discovery_attempt = None;
    }

    // ── Driving tick ─────────────────────────────────────────────────

    /// One tick of the bootstrap/update state machine.
    ///
    /// 1. No session: validate the stored token (if link + token exist)
    ///    and construct one, continuing in the same tick.
    /// 2. Pump the session. Busy (connecting/connected/disconnecting)
    ///    means we are done for this tick.
    /// 3. Idle session: attempt cooldown-gated discovery + connect.
    pub async fn update(&mut self) {
        if self.session.is_none() && !self.bootstrap().await {
            return;
        }

        let outcome = match self.session.as_mut() {
            Some(session) => session.tick(),
            None => return,
        };

        for event in outcome.events {
            self.process_session_event(event);
        }

        if outcome.busy {
            return;
        }

        self.try_connect_gateway().await;
    }

    /// Validate the stored token and construct a session from it.
    /// Returns `true` if a session now exists.
    async fn bootstrap(&mut self) -> bool {
        if !self.flags.has_link {
            return false;
        }
        let Some(token) = self.token_store.get() else {
            return false;
        };

        match self.control.device_self(&token).await {
            Ok(info) => {
                log_device_info(&info);
                self.flags.authenticated = true;
                debug!("device token verified");
                self.session = Some(self.build_session(token));
                true
            }
            Err(gatelink_api::Error::Unauthorized) => {
                warn!("device token rejected, clearing it");
                if let Err(e) = self.token_store.clear() {
                    warn!(error = %e, "failed to clear rejected token");
                }
                self.flags.authenticated = false;
                false
            }
            Err(e) => {
                // Retried on every tick, so recovery is immediate once
                // the backend is reachable again.
                debug!(error = %e, "token validation failed, retrying next tick");
                false
            }
        }
    }

    fn build_session(&self, token: SecretString) -> GatewaySession {
        GatewaySession::new(
            token,
            self.config.firmware_version.clone(),
            self.config.tls.clone(),
        )
    }

    fn process_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                info!("gateway session connected");
                self.observers.notify_all(true);
            }
            SessionEvent::Disconnected => {
                info!("gateway session disconnected");
                self.observers.notify_all(false);
            }
            SessionEvent::Message(SessionMessage::ControlCommands(commands)) => {
                self.dispatch_commands(&commands);
            }
            SessionEvent::Message(SessionMessage::CaptivePortalToggle(enabled)) => {
                debug!(enabled, "captive portal toggle from gateway");
                self.captive_portal.set_always_enabled(enabled);
            }
        }
    }

    fn dispatch_commands(&self, commands: &[InboundCommand]) {
        for command in commands {
            if !self.commands.handle(command) {
                warn!(id = command.id, kind = ?command.kind, "remote command rejected");
            }
        }
    }

    /// Discovery + connect, gated by the cooldown. The attempt consumes
    /// the cooldown window whether it succeeds or not.
    async fn try_connect_gateway(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_discovery_attempt {
            if now.duration_since(last) < self.config.discovery_cooldown {
                return;
            }
        }
        self.last_discovery_attempt = Some(now);

        let Some(token) = self.token_store.get() else {
            debug!("no device token, skipping gateway discovery");
            return;
        };

        match self.control.assign_gateway(&token).await {
            Ok(assignment) => {
                info!(fqdn = %assignment.fqdn, country = %assignment.country, "gateway assigned");
                if let Some(session) = self.session.as_mut() {
                    if let Err(e) = session.connect(&assignment.fqdn) {
                        warn!(error = %e, "failed to start gateway connection");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "gateway discovery failed");
            }
        }
    }
}

fn log_device_info(info: &DeviceInfo) {
    debug!(id = %info.id, name = %info.name, "device identity confirmed");
    for endpoint in &info.endpoints {
        debug!(
            id = %endpoint.id,
            rf_id = endpoint.rf_id,
            model = endpoint.model,
            "found controllable endpoint"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────
