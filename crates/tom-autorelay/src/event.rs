use serde::Serialize;

use crate::types::NodeId;

/// Relay membership events, broadcast to subscribers of
/// [`RelayCoordinator::subscribe`](crate::RelayCoordinator::subscribe).
///
/// No replacement relay is looked for when one is lost; consumers that
/// want one can react to [`AutoRelayEvent::RelayRemoved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutoRelayEvent {
    /// Peer passed the hop probe and is now an active relay.
    RelayAdded { node_id: NodeId },
    /// An active relay disconnected.
    RelayRemoved {
        node_id: NodeId,
        reason: Option<String>,
    },
    /// Peer answered that it will not hop for us.
    ProbeRejected { node_id: NodeId },
    /// Probe failed (transport, protocol, timeout).
    ProbeFailed { node_id: NodeId, error: String },
    /// Probe succeeded after the peer had already disconnected.
    StaleProbeDiscarded { node_id: NodeId },
}

impl AutoRelayEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            AutoRelayEvent::RelayAdded { node_id }
            | AutoRelayEvent::RelayRemoved { node_id, .. }
            | AutoRelayEvent::ProbeRejected { node_id }
            | AutoRelayEvent::ProbeFailed { node_id, .. }
            | AutoRelayEvent::StaleProbeDiscarded { node_id } => *node_id,
        }
    }
}
