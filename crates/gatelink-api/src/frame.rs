//! Inbound session frame protocol.
//!
//! The gateway sends JSON text frames shaped as
//! `{ "responseType": <int>, "data": ... }`. Type 0 carries a batch of
//! control commands, type 1 a captive-portal toggle. Anything else —
//! unknown types, malformed JSON, malformed records — is dropped without
//! surfacing an error. That lenient policy is deliberate (the device must
//! keep running unattended); drops are logged so they stay observable.

use serde::Deserialize;
use tracing::debug;

/// Keep-alive payload sent while the session is connected.
pub const KEEPALIVE_FRAME: &str = "{\"requestType\": 0}";

// ── Command types ────────────────────────────────────────────────────

/// What an inbound control command asks the actuator to do.
///
/// Codes outside the known set are preserved as [`Other`](Self::Other)
/// and passed through to the command sink, which owns the reject policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Stop,
    Pulse,
    Vibrate,
    Sound,
    Other(u8),
}

impl From<u8> for CommandKind {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Stop,
            1 => Self::Pulse,
            2 => Self::Vibrate,
            3 => Self::Sound,
            other => Self::Other(other),
        }
    }
}

impl CommandKind {
    /// The wire code for this command kind.
    pub fn raw(self) -> u8 {
        match self {
            Self::Stop => 0,
            Self::Pulse => 1,
            Self::Vibrate => 2,
            Self::Sound => 3,
            Self::Other(raw) => raw,
        }
    }
}

/// A single decoded control command from a type-0 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// Target endpoint id.
    pub id: u16,
    pub kind: CommandKind,
    pub intensity: u8,
    pub duration_ms: u32,
    pub model: u8,
}

/// A decoded inbound frame the session hands to its owner for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    /// Batch of control commands. Each is forwarded independently.
    ControlCommands(Vec<InboundCommand>),
    /// Force-enable or -disable the captive portal's always-on mode.
    CaptivePortalToggle(bool),
}

// ── Wire structs ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "responseType")]
    response_type: i64,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    id: u16,
    #[serde(rename = "type")]
    kind: u8,
    intensity: u8,
    duration: u32,
    model: u8,
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode a text frame into a [`SessionMessage`].
///
/// Returns `None` for anything that doesn't parse or isn't a known frame
/// type. Within a command batch, records that fail to decode are skipped
/// individually; the rest of the batch still goes through.
pub fn decode_frame(text: &str) -> Option<SessionMessage> {
    let frame: RawFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, len = text.len(), "dropping malformed session frame");
            return None;
        }
    };

    match frame.response_type {
        0 => Some(SessionMessage::ControlCommands(decode_commands(&frame.data))),
        1 => match frame.data.as_bool() {
            Some(enabled) => Some(SessionMessage::CaptivePortalToggle(enabled)),
            None => {
                debug!("captive portal frame without boolean data, dropping");
                None
            }
        },
        other => {
            debug!(response_type = other, "ignoring unknown session frame type");
            None
        }
    }
}

fn decode_commands(data: &serde_json::Value) -> Vec<InboundCommand> {
    let Some(records) = data.as_array() else {
        debug!("control command frame without array data, dropping");
        return Vec::new();
    };

    let mut commands = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value::<RawCommand>(record.clone()) {
            Ok(raw) => commands.push(InboundCommand {
                id: raw.id,
                kind: CommandKind::from(raw.kind),
                intensity: raw.intensity,
                duration_ms: raw.duration,
                model: raw.model,
            }),
            Err(e) => {
                debug!(error = %e, "skipping malformed command record");
            }
        }
    }
    commands
}

// ── Tests ────────────────────────────────────────────────────────────
