/// Bounded relay membership.
///
/// Tracks the peers we listen on as relays plus the peers whose hop probe
/// is still running. Both count against capacity, so a probe that succeeds
/// can always be confirmed without overshooting `capacity`.
///
/// A disconnect drops a peer's pending entry. Each reservation carries the
/// generation it was issued with; confirming or releasing a reservation
/// whose generation is no longer pending is a no-op.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::NodeId;

/// Why a reservation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionRefused {
    #[error("relay capacity reached")]
    AtCapacity,
    #[error("peer is already a relay")]
    AlreadyMember,
    #[error("hop probe already in flight")]
    ProbeInFlight,
}

/// What a disconnect removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Peer was neither a relay nor being probed.
    NotPresent,
    /// Peer was an active relay.
    Member,
    /// Peer had a probe in flight; its result will be discarded.
    Probing,
}

#[derive(Debug, Default)]
struct State {
    members: HashSet<NodeId>,
    /// Peer -> generation of its in-flight reservation.
    pending: HashMap<NodeId, u64>,
    next_generation: u64,
}

impl State {
    fn occupied(&self) -> usize {
        self.members.len() + self.pending.len()
    }
}

/// Capacity-bounded set of active relays. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct RelayMembershipSet {
    capacity: usize,
    state: Arc<Mutex<State>>,
}

impl RelayMembershipSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    // Every mutation leaves State consistent before it can panic.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of relays.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active relays.
    pub fn size(&self) -> usize {
        self.state().members.len()
    }

    /// Number of probes holding a reservation.
    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    pub fn contains(&self, peer: &NodeId) -> bool {
        self.state().members.contains(peer)
    }

    pub fn is_probing(&self, peer: &NodeId) -> bool {
        self.state().pending.contains_key(peer)
    }

    /// Add a relay directly, bypassing the probe.
    ///
    /// Returns `true` if newly added. Refuses when full; a pending
    /// reservation for the same peer is converted in place.
    pub fn add(&self, peer: NodeId) -> bool {
        let mut state = self.state();
        if state.members.contains(&peer) {
            return false;
        }
        if state.pending.remove(&peer).is_none() && state.occupied() >= self.capacity {
            return false;
        }
        state.members.insert(peer)
    }

    /// Remove a relay. Returns `true` if it was a member.
    ///
    /// Also drops any in-flight reservation for the peer.
    pub fn remove(&self, peer: &NodeId) -> bool {
        self.evict(peer) == Eviction::Member
    }

    /// Remove a peer on disconnect and poison its in-flight probe.
    pub fn evict(&self, peer: &NodeId) -> Eviction {
        let mut state = self.state();
        if state.members.remove(peer) {
            Eviction::Member
        } else if state.pending.remove(peer).is_some() {
            Eviction::Probing
        } else {
            Eviction::NotPresent
        }
    }

    /// Reserve a slot for `peer` before probing it.
    ///
    /// Capacity is checked and the slot taken in one critical section.
    pub fn reserve(&self, peer: NodeId) -> Result<Reservation, AdmissionRefused> {
        let mut state = self.state();
        if state.members.contains(&peer) {
            return Err(AdmissionRefused::AlreadyMember);
        }
        if state.pending.contains_key(&peer) {
            return Err(AdmissionRefused::ProbeInFlight);
        }
        if state.occupied() >= self.capacity {
            return Err(AdmissionRefused::AtCapacity);
        }

        let generation = state.next_generation;
        state.next_generation += 1;
        state.pending.insert(peer, generation);

        Ok(Reservation {
            set: self.clone(),
            peer,
            generation,
            settled: false,
        })
    }

    /// Sorted copy of the current relays.
    pub fn snapshot(&self) -> Vec<NodeId> {
        let mut relays: Vec<NodeId> = self.state().members.iter().copied().collect();
        relays.sort();
        relays
    }
}

/// A held slot for one in-flight probe.
///
/// Dropping an unconfirmed reservation releases the slot.
#[derive(Debug)]
pub struct Reservation {
    set: RelayMembershipSet,
    peer: NodeId,
    generation: u64,
    settled: bool,
}

impl Reservation {
    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Turn the slot into membership.
    ///
    /// Returns `false` if the peer disconnected (or reconnected) since the
    /// reservation was taken; the stale result is discarded.
    pub fn confirm(mut self) -> bool {
        self.settled = true;
        let mut state = self.set.state();
        if state.pending.get(&self.peer) != Some(&self.generation) {
            return false;
        }
        state.pending.remove(&self.peer);
        state.members.insert(self.peer)
    }

    /// Give the slot back.
    pub fn release(self) {}
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.set.state();
        if state.pending.get(&self.peer) == Some(&self.generation) {
            state.pending.remove(&self.peer);
        }
    }
}
