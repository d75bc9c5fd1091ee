use tom_autorelay::{NodeId, ProbeError};

/// Errors returned by the hop protocol.
#[derive(Debug, thiserror::Error)]
pub enum HopError {
    #[error("connection to {node_id} failed: {source}")]
    Connect {
        node_id: NodeId,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to open hop stream: {0}")]
    OpenStream(#[source] anyhow::Error),

    #[error("hop stream write failed: {0}")]
    Write(#[source] anyhow::Error),

    #[error("hop stream read failed: {0}")]
    Read(#[source] anyhow::Error),

    #[error("hop message serialization failed: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("hop message deserialization failed: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("hop frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("unexpected hop message: {0}")]
    UnexpectedMessage(String),
}

impl From<HopError> for ProbeError {
    fn from(e: HopError) -> Self {
        match e {
            HopError::Connect { .. }
            | HopError::OpenStream(_)
            | HopError::Write(_)
            | HopError::Read(_) => ProbeError::Transport(e.to_string()),
            HopError::Serialization(_)
            | HopError::Deserialization(_)
            | HopError::FrameTooLarge { .. }
            | HopError::UnexpectedMessage(_) => ProbeError::Protocol(e.to_string()),
        }
    }
}
