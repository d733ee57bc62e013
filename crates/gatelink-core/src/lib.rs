// gatelink-core: Session lifecycle orchestration between the wire layer
// (gatelink-api) and the device's collaborators (command execution,
// captive portal, link monitoring, token persistence).

pub mod config;
pub mod error;
pub mod manager;
pub mod observers;
pub mod token_store;
pub mod traits;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ManagerConfig;
pub use error::CoreError;
pub use manager::SessionManager;
pub use observers::{ObserverHandle, ObserverRegistry};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use traits::{CaptivePortal, CommandSink, LinkEvent};

// Re-export the wire types consumers dispatch on.
pub use gatelink_api::{CommandKind, ConnectionState, InboundCommand, TlsMode};
