use crate::types::NodeId;

/// Connection-lifecycle callbacks for peers that speak the relay protocol.
///
/// The topology layer filters connections by protocol and calls these
/// once per connection: `on_connect` when it is established, then
/// `on_disconnect` when it ends. Implementations must not block.
///
/// Implementations may spawn work onto the current Tokio runtime, so call
/// these from within one. `RelayCoordinator` ignores a connect reported
/// outside a runtime and logs a warning.
pub trait LifecycleHandler<C>: Send + Sync {
    fn on_connect(&self, peer: NodeId, connection: C);

    fn on_disconnect(&self, peer: NodeId, reason: Option<String>);
}
