use std::sync::Arc;

use iroh::endpoint::Connection;
use iroh::{Endpoint, EndpointAddr};
use tokio::task::JoinHandle;
use tom_autorelay::{LifecycleHandler, NodeId};

use crate::error::HopError;
use crate::responder::serve_hop_queries;
use crate::HOP_ALPN;

/// Report one hop-protocol connection to `handler`.
///
/// Calls `on_connect` right away, then `on_disconnect` with the close
/// reason once the connection ends. The returned task finishes after the
/// disconnect callback.
pub fn watch_connection<H>(handler: Arc<H>, connection: Connection) -> JoinHandle<()>
where
    H: LifecycleHandler<Connection> + ?Sized + 'static,
{
    let peer = NodeId::from_public_key(connection.remote_id());
    handler.on_connect(peer, connection.clone());

    tokio::spawn(async move {
        let reason = connection.closed().await;
        tracing::debug!("hop: connection to {peer} closed: {reason}");
        handler.on_disconnect(peer, Some(reason.to_string()));
    })
}

/// Dial a relay candidate on [`HOP_ALPN`] and watch the connection.
///
/// The dialed peer may probe us back over the same connection, so hop
/// queries it opens are answered per `hop_enabled` until the connection
/// closes.
pub async fn connect_candidate<H>(
    endpoint: &Endpoint,
    addr: impl Into<EndpointAddr>,
    handler: Arc<H>,
    hop_enabled: bool,
) -> Result<JoinHandle<()>, HopError>
where
    H: LifecycleHandler<Connection> + ?Sized + 'static,
{
    let addr = addr.into();
    let node_id = NodeId::from_public_key(addr.id);
    let connection = endpoint
        .connect(addr, HOP_ALPN)
        .await
        .map_err(|e| HopError::Connect {
            node_id,
            source: e.into(),
        })?;

    tokio::spawn(serve_hop_queries(connection.clone(), hop_enabled));
    Ok(watch_connection(handler, connection))
}
