use std::sync::Arc;

use iroh::endpoint::{Connection, RecvStream, SendStream};
use iroh::protocol::AcceptError;
use tom_autorelay::{LifecycleHandler, NodeId};

use crate::error::HopError;
use crate::topology::watch_connection;
use crate::wire::{self, HopMessage, HopStatus};

/// Answers hop queries on incoming [`HOP_ALPN`](crate::HOP_ALPN) connections.
///
/// With hop enabled the node tells askers it will forward traffic for them.
/// A lifecycle handler, if set, is also told about every accepted
/// connection, so peers that dial us count as relay candidates too. Their
/// answers come from the dialer's own loop, see
/// [`connect_candidate`](crate::connect_candidate).
#[derive(Clone)]
pub struct HopResponder {
    hop_enabled: bool,
    lifecycle: Option<Arc<dyn LifecycleHandler<Connection>>>,
}

impl std::fmt::Debug for HopResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HopResponder")
            .field("hop_enabled", &self.hop_enabled)
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}

impl HopResponder {
    pub fn new(hop_enabled: bool) -> Self {
        Self {
            hop_enabled,
            lifecycle: None,
        }
    }

    /// Report accepted connections to `handler`.
    pub fn with_lifecycle(mut self, handler: Arc<dyn LifecycleHandler<Connection>>) -> Self {
        self.lifecycle = Some(handler);
        self
    }

    pub fn hop_enabled(&self) -> bool {
        self.hop_enabled
    }
}

impl iroh::protocol::ProtocolHandler for HopResponder {
    async fn accept(&self, connection: Connection) -> Result<(), AcceptError> {
        if let Some(handler) = &self.lifecycle {
            watch_connection(handler.clone(), connection.clone());
        }

        serve_hop_queries(connection, self.hop_enabled).await;
        Ok(())
    }
}

/// Answer hop queries on `connection` until it closes.
///
/// Either side of a hop connection may ask, so dialers run this too.
pub(crate) async fn serve_hop_queries(connection: Connection, hop_enabled: bool) {
    let remote = NodeId::from_public_key(connection.remote_id());

    // One hop query per bi-directional stream
    loop {
        let (mut send, mut recv) = match connection.accept_bi().await {
            Ok(streams) => streams,
            Err(_) => break, // Connection closed
        };

        tokio::spawn(async move {
            if let Err(e) = answer(&mut send, &mut recv, hop_enabled).await {
                tracing::warn!("hop: failed to answer {remote}: {e}");
            }
        });
    }
}

async fn answer(
    send: &mut SendStream,
    recv: &mut RecvStream,
    hop_enabled: bool,
) -> Result<(), HopError> {
    let reply = match wire::read_message(recv).await? {
        HopMessage::CanHop => HopMessage::Status(status_for(hop_enabled)),
        other => {
            tracing::debug!("hop: unexpected request {other:?}");
            HopMessage::Status(HopStatus::MalformedRequest)
        }
    };
    wire::write_message(send, &reply).await
}

fn status_for(hop_enabled: bool) -> HopStatus {
    if hop_enabled {
        HopStatus::Success
    } else {
        HopStatus::HopDisabled
    }
}
