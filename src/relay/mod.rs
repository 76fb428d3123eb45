//! Media relay façade
//!
//! Addressing of the backend's media ingest and the relay that forwards
//! captured frames to the transport.

#[allow(clippy::module_inception)]
pub mod relay;
pub mod target;

pub use relay::{MediaRelay, MediaTransport, RelayStatus, TransportError, TransportEvent};
pub use target::{TransportEndpoint, TransportTarget, TRANSPORT_APPLICATION, TRANSPORT_PORT};
