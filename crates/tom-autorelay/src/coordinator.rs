/// Relay coordinator — turns connect/disconnect notifications into relay
/// membership.
///
/// Connect: cheap capacity check, reserve a slot, probe hop capability,
/// confirm on success. Disconnect: drop the relay and poison any probe
/// still running for that peer, so a late "can hop" is thrown away.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::AutoRelayConfig;
use crate::error::{AutoRelayError, ProbeError};
use crate::event::AutoRelayEvent;
use crate::membership::{AdmissionRefused, Eviction, RelayMembershipSet, Reservation};
use crate::metrics::AutoRelayMetrics;
use crate::probe::{CapabilityProbe, ProbeOutcome};
use crate::topology::LifecycleHandler;
use crate::types::NodeId;

/// How a connect notification was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Probe succeeded and the peer is now a relay.
    Admitted,
    /// Relay set full, no probe issued.
    AtCapacity,
    /// Already a relay, no probe issued.
    AlreadyMember,
    /// A probe for this peer is already running.
    ProbeInFlight,
    /// Peer answered that it will not hop.
    NotCapable,
    /// Probe failed or timed out.
    Failed,
    /// Probe succeeded after the peer disconnected; result discarded.
    Stale,
}

impl From<AdmissionRefused> for Admission {
    fn from(refused: AdmissionRefused) -> Self {
        match refused {
            AdmissionRefused::AtCapacity => Admission::AtCapacity,
            AdmissionRefused::AlreadyMember => Admission::AlreadyMember,
            AdmissionRefused::ProbeInFlight => Admission::ProbeInFlight,
        }
    }
}

struct Inner<P> {
    probe: P,
    membership: RelayMembershipSet,
    probe_timeout: Duration,
    events: broadcast::Sender<AutoRelayEvent>,
    metrics: AutoRelayMetrics,
}

/// Maintains the set of relays this node listens on.
///
/// Cheap to clone; clones drive the same membership set.
pub struct RelayCoordinator<P: CapabilityProbe> {
    inner: Arc<Inner<P>>,
}

impl<P: CapabilityProbe> Clone for RelayCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: CapabilityProbe> RelayCoordinator<P> {
    pub fn new(config: AutoRelayConfig, probe: P) -> Result<Self, AutoRelayError> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_buffer);

        Ok(Self {
            inner: Arc::new(Inner {
                probe,
                membership: RelayMembershipSet::new(config.max_listeners),
                probe_timeout: config.probe_timeout,
                events,
                metrics: AutoRelayMetrics::default(),
            }),
        })
    }

    /// Topology reports a new connection with a relay-protocol peer.
    ///
    /// The slot is reserved before this returns, so a disconnect reported
    /// right after it always poisons the admission. Only the probe runs on
    /// its own task, so one slow probe never holds up other peers.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn on_peer_connected(
        &self,
        peer: NodeId,
        connection: P::Connection,
    ) -> JoinHandle<Admission> {
        match self.admit(peer) {
            Ok(reservation) => {
                let this = self.clone();
                tokio::spawn(async move { this.settle(reservation, connection).await })
            }
            Err(admission) => tokio::spawn(async move { admission }),
        }
    }

    /// Run the admission flow for one connection to completion.
    pub async fn handle_connect(&self, peer: NodeId, connection: P::Connection) -> Admission {
        match self.admit(peer) {
            Ok(reservation) => self.settle(reservation, connection).await,
            Err(admission) => admission,
        }
    }

    /// Early checks and slot reservation. Never blocks.
    fn admit(&self, peer: NodeId) -> Result<Reservation, Admission> {
        let inner = &self.inner;
        let membership = &inner.membership;

        // Already listening on enough relays
        if membership.size() >= membership.capacity() {
            inner.metrics.capacity_skips.inc();
            tracing::trace!(
                "autorelay: skip {peer}, listening on {} relays",
                membership.capacity()
            );
            return Err(Admission::AtCapacity);
        }

        tracing::debug!("autorelay: connected {peer}");

        if membership.contains(&peer) {
            return Err(Admission::AlreadyMember);
        }

        match membership.reserve(peer) {
            Ok(reservation) => {
                inner.metrics.probes_started.inc();
                Ok(reservation)
            }
            Err(refused) => {
                if refused == AdmissionRefused::AtCapacity {
                    inner.metrics.capacity_skips.inc();
                }
                tracing::trace!("autorelay: not probing {peer}: {refused}");
                Err(refused.into())
            }
        }
    }

    /// Probe a reserved peer, then confirm or release its slot.
    async fn settle(&self, reservation: Reservation, connection: P::Connection) -> Admission {
        let inner = &self.inner;
        let membership = &inner.membership;
        let peer = reservation.peer();

        let probe = inner.probe.probe(&connection);
        let outcome = match tokio::time::timeout(inner.probe_timeout, probe).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::Error(ProbeError::Timeout {
                after: inner.probe_timeout,
            }),
        };
        drop(connection);

        match outcome {
            ProbeOutcome::Capable => {
                inner.metrics.probes_capable.inc();
                if reservation.confirm() {
                    inner.metrics.relays_added.inc();
                    tracing::info!(
                        "autorelay: listening on relay {peer} ({}/{})",
                        membership.size(),
                        membership.capacity()
                    );
                    self.emit(AutoRelayEvent::RelayAdded { node_id: peer });
                    Admission::Admitted
                } else {
                    inner.metrics.stale_results.inc();
                    tracing::debug!("autorelay: {peer} disconnected during hop probe");
                    self.emit(AutoRelayEvent::StaleProbeDiscarded { node_id: peer });
                    Admission::Stale
                }
            }
            ProbeOutcome::NotCapable => {
                reservation.release();
                inner.metrics.probes_not_capable.inc();
                tracing::debug!("autorelay: {peer} cannot hop");
                self.emit(AutoRelayEvent::ProbeRejected { node_id: peer });
                Admission::NotCapable
            }
            ProbeOutcome::Error(e) => {
                reservation.release();
                inner.metrics.probes_failed.inc();
                tracing::warn!("autorelay: hop probe to {peer} failed: {e}");
                self.emit(AutoRelayEvent::ProbeFailed {
                    node_id: peer,
                    error: e.to_string(),
                });
                Admission::Failed
            }
        }
    }

    /// Topology reports that the connection to `peer` ended.
    pub fn on_peer_disconnected(&self, peer: NodeId, reason: Option<&str>) -> Eviction {
        let eviction = self.inner.membership.evict(&peer);
        match eviction {
            Eviction::NotPresent => {}
            Eviction::Probing => {
                tracing::debug!("autorelay: {peer} disconnected while probing");
            }
            Eviction::Member => {
                self.inner.metrics.relays_removed.inc();
                tracing::info!("autorelay: connection ended {peer} {}", reason.unwrap_or(""));
                self.emit(AutoRelayEvent::RelayRemoved {
                    node_id: peer,
                    reason: reason.map(str::to_string),
                });
            }
        }
        eviction
    }

    /// Subscribe to membership events.
    pub fn subscribe(&self) -> broadcast::Receiver<AutoRelayEvent> {
        self.inner.events.subscribe()
    }

    /// Sorted snapshot of the active relays.
    pub fn relays(&self) -> Vec<NodeId> {
        self.inner.membership.snapshot()
    }

    pub fn relay_count(&self) -> usize {
        self.inner.membership.size()
    }

    pub fn is_relay(&self, peer: &NodeId) -> bool {
        self.inner.membership.contains(peer)
    }

    pub fn is_probing(&self, peer: &NodeId) -> bool {
        self.inner.membership.is_probing(peer)
    }

    pub fn max_listeners(&self) -> usize {
        self.inner.membership.capacity()
    }

    pub fn metrics(&self) -> &AutoRelayMetrics {
        &self.inner.metrics
    }

    fn emit(&self, event: AutoRelayEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.inner.events.send(event);
    }
}

impl<P: CapabilityProbe> LifecycleHandler<P::Connection> for RelayCoordinator<P> {
    fn on_connect(&self, peer: NodeId, connection: P::Connection) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("autorelay: ignoring connect from {peer}: {e}");
                return;
            }
        };

        let reservation = match self.admit(peer) {
            Ok(reservation) => reservation,
            Err(_) => return,
        };
        let this = self.clone();
        let task = runtime.spawn(async move { this.settle(reservation, connection).await });

        // Nobody else holds the handle, surface a crashed admission here
        runtime.spawn(async move {
            if let Err(e) = task.await {
                tracing::warn!("autorelay: admission of {peer} aborted: {e}");
            }
        });
    }

    fn on_disconnect(&self, peer: NodeId, reason: Option<String>) {
        self.on_peer_disconnected(peer, reason.as_deref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock::{ScriptedConnection, ScriptedProbe};
    use crate::types::test_node_id;

    fn coordinator(max: usize) -> (RelayCoordinator<ScriptedProbe>, ScriptedProbe) {
        let probe = ScriptedProbe::default();
        let config = AutoRelayConfig::new().max_listeners(max);
        (RelayCoordinator::new(config, probe.clone()).unwrap(), probe)
    }

    fn capable() -> ScriptedConnection {
        ScriptedConnection::answering(ProbeOutcome::Capable)
    }

    #[tokio::test]
    async fn sequential_connects_fill_to_capacity() {
        let (coord, probe) = coordinator(2);
        let (x, y, z) = (test_node_id(1), test_node_id(2), test_node_id(3));

        assert_eq!(coord.handle_connect(x, capable()).await, Admission::Admitted);
        assert_eq!(coord.handle_connect(y, capable()).await, Admission::Admitted);
        assert_eq!(coord.handle_connect(z, capable()).await, Admission::AtCapacity);

        assert_eq!(probe.calls(), 2);
        assert_eq!(coord.relays(), {
            let mut v = vec![x, y];
            v.sort();
            v
        });
        assert_eq!(coord.metrics().capacity_skips.get(), 1);
    }

    #[tokio::test]
    async fn slot_freed_by_disconnect_is_reusable() {
        let (coord, _) = coordinator(2);
        let (x, y, z) = (test_node_id(1), test_node_id(2), test_node_id(3));
        coord.handle_connect(x, capable()).await;
        coord.handle_connect(y, capable()).await;
        coord.handle_connect(z, capable()).await;

        assert_eq!(coord.on_peer_disconnected(x, Some("closed")), Eviction::Member);
        assert_eq!(coord.relays(), vec![y]);

        assert_eq!(coord.handle_connect(z, capable()).await, Admission::Admitted);
        assert_eq!(coord.relay_count(), 2);
        assert!(coord.is_relay(&y));
        assert!(coord.is_relay(&z));
        assert!(!coord.is_relay(&x));
    }

    #[tokio::test]
    async fn probe_error_is_contained() {
        let (coord, _) = coordinator(1);
        let mut events = coord.subscribe();
        let w = test_node_id(4);

        let conn = ScriptedConnection::answering(ProbeOutcome::Error(ProbeError::Transport(
            "stream reset".into(),
        )));
        assert_eq!(coord.handle_connect(w, conn).await, Admission::Failed);
        assert_eq!(coord.relay_count(), 0);
        assert!(!coord.is_relay(&w));
        assert!(!coord.is_probing(&w));
        assert_eq!(coord.metrics().probes_failed.get(), 1);

        match events.recv().await.unwrap() {
            AutoRelayEvent::ProbeFailed { node_id, error } => {
                assert_eq!(node_id, w);
                assert!(error.contains("stream reset"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_capable_is_not_admitted() {
        let (coord, _) = coordinator(3);
        let v = test_node_id(5);

        let conn = ScriptedConnection::answering(ProbeOutcome::NotCapable);
        assert_eq!(coord.handle_connect(v, conn).await, Admission::NotCapable);
        assert_eq!(coord.relay_count(), 0);
        assert!(!coord.is_relay(&v));
        assert_eq!(coord.metrics().probes_not_capable.get(), 1);
    }

    #[tokio::test]
    async fn connect_for_member_is_idempotent() {
        let (coord, probe) = coordinator(3);
        let x = test_node_id(1);

        coord.handle_connect(x, capable()).await;
        assert_eq!(coord.handle_connect(x, capable()).await, Admission::AlreadyMember);
        assert_eq!(probe.calls(), 1);
        assert_eq!(coord.relay_count(), 1);
    }

    #[tokio::test]
    async fn disconnect_of_stranger_is_noop() {
        let (coord, _) = coordinator(2);
        let mut events = coord.subscribe();
        coord.handle_connect(test_node_id(1), capable()).await;
        let _ = events.recv().await;

        assert_eq!(
            coord.on_peer_disconnected(test_node_id(9), None),
            Eviction::NotPresent
        );
        assert_eq!(coord.relay_count(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn zero_listeners_skips_probe() {
        let (coord, probe) = coordinator(0);
        assert_eq!(
            coord.handle_connect(test_node_id(1), capable()).await,
            Admission::AtCapacity
        );
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn disconnect_poisons_inflight_probe() {
        let (coord, _) = coordinator(2);
        let p = test_node_id(6);
        let conn = ScriptedConnection::gated(ProbeOutcome::Capable);

        let task = coord.on_peer_connected(p, conn.clone());
        while !coord.is_probing(&p) {
            tokio::task::yield_now().await;
        }

        assert_eq!(coord.on_peer_disconnected(p, Some("reset")), Eviction::Probing);
        conn.release();

        assert_eq!(task.await.unwrap(), Admission::Stale);
        assert!(!coord.is_relay(&p));
        assert_eq!(coord.relay_count(), 0);
        assert_eq!(coord.metrics().stale_results.get(), 1);
    }

    #[tokio::test]
    async fn duplicate_connect_while_probing_is_skipped() {
        let (coord, probe) = coordinator(2);
        let p = test_node_id(7);
        let conn = ScriptedConnection::gated(ProbeOutcome::Capable);

        let task = coord.on_peer_connected(p, conn.clone());
        while !coord.is_probing(&p) {
            tokio::task::yield_now().await;
        }
        assert_eq!(coord.handle_connect(p, capable()).await, Admission::ProbeInFlight);

        conn.release();
        assert_eq!(task.await.unwrap(), Admission::Admitted);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn lifecycle_handler_drives_membership() {
        let (coord, _) = coordinator(1);
        let mut events = coord.subscribe();
        let p = test_node_id(8);

        LifecycleHandler::on_connect(&coord, p, capable());
        assert_eq!(
            events.recv().await.unwrap(),
            AutoRelayEvent::RelayAdded { node_id: p }
        );

        LifecycleHandler::on_disconnect(&coord, p, Some("idle".into()));
        assert_eq!(
            events.recv().await.unwrap(),
            AutoRelayEvent::RelayRemoved {
                node_id: p,
                reason: Some("idle".into())
            }
        );
        assert_eq!(coord.relay_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_right_after_connect_never_admits() {
        let (coord, _) = coordinator(2);
        let mut events = coord.subscribe();
        let p = test_node_id(10);

        // No yield between the two notifications
        let task = coord.on_peer_connected(p, capable());
        assert!(coord.is_probing(&p));
        assert_eq!(coord.on_peer_disconnected(p, Some("closed")), Eviction::Probing);

        assert_eq!(task.await.unwrap(), Admission::Stale);
        assert!(!coord.is_relay(&p));
        assert_eq!(coord.relay_count(), 0);
        assert_eq!(
            events.recv().await.unwrap(),
            AutoRelayEvent::StaleProbeDiscarded { node_id: p }
        );
    }

    #[tokio::test]
    async fn refused_connect_resolves_without_reserving() {
        let (coord, probe) = coordinator(1);
        let x = test_node_id(1);
        coord.handle_connect(x, capable()).await;

        let task = coord.on_peer_connected(test_node_id(2), capable());
        assert!(!coord.is_probing(&test_node_id(2)));
        assert_eq!(task.await.unwrap(), Admission::AtCapacity);
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn lifecycle_connect_outside_runtime_is_ignored() {
        let (coord, probe) = coordinator(2);
        let p = test_node_id(11);

        LifecycleHandler::on_connect(&coord, p, capable());

        assert!(!coord.is_probing(&p));
        assert!(!coord.is_relay(&p));
        assert_eq!(coord.metrics().probes_started.get(), 0);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn crashed_admission_frees_its_slot() {
        let (coord, _) = coordinator(1);
        let (p, q) = (test_node_id(12), test_node_id(13));

        LifecycleHandler::on_connect(&coord, p, ScriptedConnection::crashing());
        assert!(coord.is_probing(&p));
        while coord.is_probing(&p) {
            tokio::task::yield_now().await;
        }

        assert!(!coord.is_relay(&p));
        assert_eq!(coord.handle_connect(q, capable()).await, Admission::Admitted);
        assert_eq!(coord.relays(), vec![q]);
    }
}
