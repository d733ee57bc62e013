// ── Collaborator interfaces ──
//
// The session core calls out to the rest of the device through these
// traits. Implementations live with the embedding application (actuator
// driver, captive portal, link monitor); the manager only dispatches.

use gatelink_api::InboundCommand;

/// Executes control commands received over the gateway session.
///
/// Returning `false` means the command was rejected; the manager logs it
/// and moves on to the next command in the batch.
pub trait CommandSink: Send + Sync {
    fn handle(&self, command: &InboundCommand) -> bool;
}

/// Captive-portal collaborator, toggled remotely via type-1 frames.
pub trait CaptivePortal: Send + Sync {
    fn set_always_enabled(&self, enabled: bool);
}

/// Link-layer connectivity event, delivered by the host's link monitor.
///
/// `Down` invalidates authentication state: the device must re-validate
/// its token once the link returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}
