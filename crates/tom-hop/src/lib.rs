//! Hop capability query over QUIC for ToM auto-relay.
//!
//! A peer that serves [`HOP_ALPN`] speaks the relay protocol. On every such
//! connection either side may ask "can you hop for me?" on a fresh
//! bi-directional stream, and the other side answers with a status.
//!
//! - [`HopProbe`] asks the question; it is the
//!   [`CapabilityProbe`](tom_autorelay::CapabilityProbe) behind a
//!   [`RelayCoordinator`](tom_autorelay::RelayCoordinator).
//! - [`HopResponder`] answers it, mounted on an iroh `Router`.
//! - [`watch_connection`] feeds one connection's lifecycle to the
//!   coordinator. [`connect_candidate`] dials, watches, and answers the
//!   peer's own hop queries on the outgoing connection.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iroh::protocol::Router;
//! use iroh::Endpoint;
//! use tom_autorelay::{AutoRelayConfig, RelayCoordinator};
//! use tom_hop::{HopProbe, HopResponder, HOP_ALPN};
//!
//! # async fn example(relay_addr: iroh::EndpointAddr) -> anyhow::Result<()> {
//! let endpoint = Endpoint::bind().await?;
//! let _router = Router::builder(endpoint.clone())
//!     .accept(HOP_ALPN, Arc::new(HopResponder::new(false)))
//!     .spawn();
//!
//! let coordinator = Arc::new(RelayCoordinator::new(AutoRelayConfig::new(), HopProbe::new())?);
//! tom_hop::connect_candidate(&endpoint, relay_addr, coordinator.clone(), false).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod probe;
mod responder;
mod topology;
mod wire;

pub use error::HopError;
pub use probe::{can_hop, HopProbe};
pub use responder::HopResponder;
pub use topology::{connect_candidate, watch_connection};
pub use wire::{HopMessage, HopStatus, MAX_FRAME_SIZE};

/// ALPN protocol identifier for the ToM relay (hop) protocol.
pub const HOP_ALPN: &[u8] = b"tom-protocol/hop/0";
