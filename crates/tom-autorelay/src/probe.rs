use crate::error::ProbeError;

/// Result of asking a peer whether it will hop for us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Capable,
    NotCapable,
    Error(ProbeError),
}

impl From<Result<bool, ProbeError>> for ProbeOutcome {
    fn from(result: Result<bool, ProbeError>) -> Self {
        match result {
            Ok(true) => ProbeOutcome::Capable,
            Ok(false) => ProbeOutcome::NotCapable,
            Err(e) => ProbeOutcome::Error(e),
        }
    }
}

/// Hop capability query over one connection.
///
/// In production: `tom_hop::HopProbe` over an iroh QUIC connection.
/// In tests: a scripted probe that answers on demand.
///
/// Implementations must not touch coordinator state. The coordinator bounds
/// every call with its configured probe timeout.
#[async_trait::async_trait]
pub trait CapabilityProbe: Send + Sync + 'static {
    /// Live connection handle to the candidate.
    type Connection: Send + Sync + 'static;

    async fn probe(&self, connection: &Self::Connection) -> ProbeOutcome;
}

// ── Scripted probe (tests) ──────────────────────────────────────────

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Connection whose probe answer is fixed up front.
    ///
    /// With a gate, the answer is held back until `release()`.
    #[derive(Clone)]
    pub struct ScriptedConnection {
        outcome: ProbeOutcome,
        gate: Option<Arc<Notify>>,
        crash: bool,
    }

    impl ScriptedConnection {
        pub fn answering(outcome: ProbeOutcome) -> Self {
            Self {
                outcome,
                gate: None,
                crash: false,
            }
        }

        pub fn gated(outcome: ProbeOutcome) -> Self {
            Self {
                outcome,
                gate: Some(Arc::new(Notify::new())),
                crash: false,
            }
        }

        /// Panics instead of answering.
        pub fn crashing() -> Self {
            Self {
                outcome: ProbeOutcome::Capable,
                gate: None,
                crash: true,
            }
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }
    }

    #[derive(Clone, Default)]
    pub struct ScriptedProbe {
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProbe {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CapabilityProbe for ScriptedProbe {
        type Connection = ScriptedConnection;

        async fn probe(&self, connection: &ScriptedConnection) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &connection.gate {
                gate.notified().await;
            }
            if connection.crash {
                panic!("scripted crash");
            }
            connection.outcome.clone()
        }
    }
}
