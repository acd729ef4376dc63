//! Public events of a room and the broadcast bus they travel on.

use crate::transfer::TransferData;
use crate::transport::TrackKind;
use roomlink_core::{
    DataTransferState, IceConnectionState, PeerId, PeerInfo, ReadyState, SignalingState,
    TransferId, TransferInfo,
};
use serde_json::Value;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Generic fan-out of events to any number of subscribers.
///
/// Emitting never blocks and never fails: events sent while nobody listens
/// are dropped, and slow subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus<E: Clone> {
    tx: broadcast::Sender<E>,
}

impl<E: Clone> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: E) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    Enter,
    Welcome,
    Offer,
    Answer,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    ReadyStateChange(ReadyState),
    PeerJoined {
        peer_id: PeerId,
        info: PeerInfo,
        is_self: bool,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    HandshakeProgress {
        peer_id: PeerId,
        step: HandshakeStep,
        error: Option<String>,
    },
    IceConnectionState {
        peer_id: PeerId,
        state: IceConnectionState,
    },
    SignalingState {
        peer_id: PeerId,
        state: SignalingState,
    },
    DataTransferState {
        peer_id: PeerId,
        transfer_id: TransferId,
        state: DataTransferState,
        info: TransferInfo,
        /// Reassembled payload, only on `DOWNLOAD_COMPLETED`.
        data: Option<TransferData>,
        error: Option<String>,
    },
    IncomingMessage {
        peer_id: PeerId,
        data: Value,
        is_private: bool,
        is_data_channel: bool,
    },
    RoomLock {
        peer_id: PeerId,
        locked: bool,
    },
    PeerUpdated {
        peer_id: PeerId,
        user_data: Value,
    },
    PeerRestart {
        peer_id: PeerId,
        is_self_initiated: bool,
        hard: bool,
    },
    ChannelError {
        peer_id: PeerId,
        channel: String,
        error: String,
    },
    RemoteTrack {
        peer_id: PeerId,
        kind: TrackKind,
        track_id: String,
    },
    /// The signaling server refused or moved this client.
    Redirect {
        action: String,
        info: String,
        reason: String,
    },
}
