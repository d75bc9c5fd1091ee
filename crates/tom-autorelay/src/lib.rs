//! ToM auto-relay.
//!
//! Keeps a bounded set of peers this node treats as active relays. Peers
//! that speak the relay protocol are reported by the topology layer; each
//! one is asked whether it will forward traffic for us ("hop") before it is
//! admitted, and it is dropped again when its connection ends.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use tom_autorelay::{AutoRelayConfig, RelayCoordinator};
//!
//! let coordinator = RelayCoordinator::new(AutoRelayConfig::new().max_listeners(2), probe)?;
//! let mut events = coordinator.subscribe();
//!
//! // Topology layer callbacks
//! coordinator.on_peer_connected(peer, connection);
//! coordinator.on_peer_disconnected(peer, Some("idle timeout"));
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod membership;
pub mod metrics;
pub mod probe;
pub mod topology;
pub mod types;

pub use config::AutoRelayConfig;
pub use coordinator::{Admission, RelayCoordinator};
pub use error::{AutoRelayError, ProbeError};
pub use event::AutoRelayEvent;
pub use membership::{AdmissionRefused, Eviction, RelayMembershipSet, Reservation};
pub use metrics::{AutoRelayMetrics, Counter};
pub use probe::{CapabilityProbe, ProbeOutcome};
pub use topology::LifecycleHandler;
pub use types::NodeId;
