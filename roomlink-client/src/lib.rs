pub mod bootstrap;
pub mod events;
pub mod health;
pub mod peer;
pub mod room;
pub mod sdp;
pub mod signaling;
pub mod timer;
pub mod transfer;
pub mod transport;

pub use bootstrap::{Bootstrap, HttpBootstrap, StaticBootstrap};
pub use events::{EventBus, HandshakeStep, RoomEvent};
pub use room::{RoomDeps, RoomSession};
pub use signaling::{GatewayEvent, SignalingGateway, WsSignalingGateway};
pub use transfer::{TransferData, TransferRequest};
pub use transport::{
    ChannelPayload, ConnectionContext, DataChannel, LocalStream, LocalTrack, MediaConstraints,
    MediaSource, OfferOptions, PeerConnection, PeerConnectionFactory, TrackKind, TransportEvent,
    TransportEventKind, WebRtcConnectionFactory,
};
