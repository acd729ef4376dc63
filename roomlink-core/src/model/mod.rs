mod agent;
mod candidate;
mod channel;
mod peer;
mod room;
mod session;
mod signaling;
mod state;
mod transfer;

pub use agent::{AgentInfo, ConnectionSettings, PeerInfo, UserInfo};
pub use candidate::{CandidateType, IceCandidateInit, IceServerConfig};
pub use channel::{ChannelEnvelope, ChannelKind, MAIN_CHANNEL};
pub use peer::{MCU_PEER_ID, PeerId};
pub use room::RoomCredentials;
pub use session::{SdpType, SessionDescription};
pub use signaling::{PcConfig, SignalEnvelope, SignalMessage};
pub use state::{
    DataChannelState, IceConnectionState, IceGatheringState, ReadyState, SignalingState,
};
pub use transfer::{
    DataTransferState, TransferDataType, TransferDirection, TransferId, TransferInfo,
};
