//! Reconnecting analyzer transport
//!
//! Separates the connection state machine (`state`) from the socket
//! driver (`ws`) so reconnection logic stays testable.

pub mod state;
pub mod ws;

pub use state::{ConnEvent, ConnState};
pub use ws::{ConnectionSnapshot, ReconnectPolicy, TransportHandle, WsTransport};
