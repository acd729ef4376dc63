use crate::transport::media::TrackKind;
use crate::transport::peer_connection::{ChannelPayload, DataChannel};
use roomlink_core::{
    DataChannelState, IceCandidateInit, IceConnectionState, IceGatheringState, PeerId,
    SignalingState,
};
use std::sync::Arc;

/// A native callback, queued for the room event loop.
#[derive(Debug)]
pub struct TransportEvent {
    pub peer_id: PeerId,
    pub generation: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug)]
pub enum TransportEventKind {
    /// `None` marks the end of candidates.
    IceCandidate(Option<IceCandidateInit>),
    IceConnectionState(IceConnectionState),
    IceGatheringState(IceGatheringState),
    SignalingState(SignalingState),
    /// The remote side opened a channel.
    DataChannel(Arc<dyn DataChannel>),
    ChannelState {
        label: String,
        state: DataChannelState,
    },
    ChannelMessage {
        label: String,
        payload: ChannelPayload,
    },
    RemoteTrack {
        kind: TrackKind,
        id: String,
    },
}
