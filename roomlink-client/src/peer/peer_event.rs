use crate::events::RoomEvent;
use roomlink_core::{IceCandidateInit, SessionDescription};

/// Output of a `PeerSession`, drained by the room after every call so
/// outgoing signaling keeps the order it was produced in.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalDescription(SessionDescription),
    LocalCandidate(IceCandidateInit),
    /// Ask the remote side to restart.
    RestartRequest { hard: bool },
    /// A negotiation began; the health monitor (re)arms its timer.
    HandshakeStarted,
    Public(RoomEvent),
}
