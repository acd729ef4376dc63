use crate::transfer::TransferRequest;
use roomlink_core::{PeerId, Result, TransferId};
use serde_json::Value;
use tokio::sync::oneshot;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests from the `RoomSession` handle to its event loop.
#[derive(Debug)]
pub enum RoomCommand {
    Transfer {
        peer_id: PeerId,
        request: TransferRequest,
        reply: Reply<TransferId>,
    },
    RespondTransfer {
        peer_id: PeerId,
        transfer_id: TransferId,
        accept: bool,
        reply: Reply<()>,
    },
    CancelTransfer {
        peer_id: PeerId,
        transfer_id: TransferId,
        reply: Reply<()>,
    },
    /// Over data channels; `None` targets every peer.
    SendP2pMessage {
        target: Option<PeerId>,
        data: Value,
        reply: Reply<()>,
    },
    /// Through the signaling server.
    SendMessage {
        target: Option<PeerId>,
        data: Value,
        reply: Reply<()>,
    },
    LockRoom {
        lock: bool,
        reply: Reply<()>,
    },
    SetUserData {
        data: Value,
        reply: Reply<()>,
    },
    RestartPeer {
        peer_id: PeerId,
        hard: bool,
        reply: Reply<()>,
    },
    Leave {
        reply: Reply<()>,
    },
}
