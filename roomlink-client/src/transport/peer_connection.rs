use crate::transport::media::LocalStream;
use crate::transport::transport_event::TransportEvent;
use async_trait::async_trait;
use bytes::Bytes;
use roomlink_core::{
    DataChannelState, IceCandidateInit, IceConnectionState, IceServerConfig, PeerId, Result,
    SessionDescription, SignalingState,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfferOptions {
    pub ice_restart: bool,
}

/// One frame received on (or sent over) a data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPayload {
    Text(String),
    Binary(Bytes),
}

/// Native data channel. Channels are always created ordered and reliable.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    fn ready_state(&self) -> DataChannelState;

    async fn send_text(&self, text: String) -> Result<()>;

    async fn send_binary(&self, data: Bytes) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

impl fmt::Debug for dyn DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataChannel({}, {:?})", self.label(), self.ready_state())
    }
}

/// Native peer connection. Every asynchronous primitive of the browser API
/// is one awaited method here; callbacks are delivered as `TransportEvent`s
/// through the sender handed over in `ConnectionContext`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Current local description, including candidates gathered so far.
    async fn local_description(&self) -> Option<SessionDescription>;

    async fn remote_description(&self) -> Option<SessionDescription>;

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    async fn add_local_stream(&self, stream: &LocalStream) -> Result<()>;

    fn signaling_state(&self) -> SignalingState;

    fn ice_connection_state(&self) -> IceConnectionState;

    async fn close(&self) -> Result<()>;
}

/// Everything a factory needs to build one connection object.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub local_id: PeerId,
    pub peer_id: PeerId,
    /// Bumped on every hard restart; events tagged with an older generation are dropped.
    pub generation: u64,
    pub ice_servers: Vec<IceServerConfig>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl ConnectionContext {
    pub fn emit(&self, kind: crate::transport::TransportEventKind) {
        let _ = self.events.send(TransportEvent {
            peer_id: self.peer_id.clone(),
            generation: self.generation,
            kind,
        });
    }
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, ctx: ConnectionContext) -> Result<Arc<dyn PeerConnection>>;
}
