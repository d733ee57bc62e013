// gatelink-api: Wire layer for the gatelink device client — control-plane
// HTTP calls and the persistent gateway WebSocket session.

pub mod control_plane;
pub mod error;
pub mod frame;
pub mod session;
pub mod tls;
pub mod transport;

pub use control_plane::{ControlPlaneClient, DeviceInfo, EndpointInfo, GatewayAssignment};
pub use error::Error;
pub use frame::{CommandKind, InboundCommand, SessionMessage};
pub use session::{ConnectionState, GatewaySession, SessionEvent, TickOutcome, TransportEvent};
pub use transport::{TlsMode, TransportConfig};
