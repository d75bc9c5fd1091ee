use std::time::Duration;

/// Errors returned by the auto-relay layer.
///
/// Only construction can fail. Per-peer problems never surface as
/// `AutoRelayError`; they are logged and reported as events.
#[derive(Debug, thiserror::Error)]
pub enum AutoRelayError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}

/// Why a hop capability probe could not produce an answer.
///
/// Non-fatal: the candidate is not admitted and no retry is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}
