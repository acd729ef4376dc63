mod candidates;
mod channel_impl;
mod handshake_impl;
mod ice_impl;
mod peer_event;
mod peer_session;
mod restart_impl;

pub use candidates::{IncomingCandidates, OutgoingCandidates, is_allowed};
pub use peer_event::PeerEvent;
pub use peer_session::{PeerSession, SessionContext};
