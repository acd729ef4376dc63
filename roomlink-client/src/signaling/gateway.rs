use async_trait::async_trait;
use roomlink_core::{Result, SignalEnvelope};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Message(SignalEnvelope),
    /// The channel is gone; carries the close reason when one was given.
    Disconnected(Option<String>),
}

/// Persistent bidirectional channel to the signaling server.
#[async_trait]
pub trait SignalingGateway: Send + Sync {
    /// Opens the channel; incoming messages arrive on the returned receiver.
    async fn open(&self, url: &str) -> Result<mpsc::UnboundedReceiver<GatewayEvent>>;

    async fn send(&self, envelope: SignalEnvelope) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
