use iroh::endpoint::Connection;
use tom_autorelay::{CapabilityProbe, NodeId, ProbeError, ProbeOutcome};

use crate::error::HopError;
use crate::wire::{self, HopMessage, HopStatus};

/// Ask the peer on `connection` whether it will hop for us.
///
/// `Ok(false)` means the peer answered but declined.
pub async fn can_hop(connection: &Connection) -> Result<bool, HopError> {
    let (mut send, mut recv) = connection
        .open_bi()
        .await
        .map_err(|e| HopError::OpenStream(e.into()))?;

    wire::write_message(&mut send, &HopMessage::CanHop).await?;

    match wire::read_message(&mut recv).await? {
        HopMessage::Status(HopStatus::Success) => Ok(true),
        HopMessage::Status(status) => {
            let remote = NodeId::from_public_key(connection.remote_id());
            tracing::debug!("hop: {remote} declined: {status:?}");
            Ok(false)
        }
        other => Err(HopError::UnexpectedMessage(format!("{other:?}"))),
    }
}

/// [`CapabilityProbe`] over iroh QUIC connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct HopProbe;

impl HopProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CapabilityProbe for HopProbe {
    type Connection = Connection;

    async fn probe(&self, connection: &Connection) -> ProbeOutcome {
        ProbeOutcome::from(can_hop(connection).await.map_err(ProbeError::from))
    }
}
