use crate::model::agent::{ConnectionSettings, UserInfo};
use crate::model::candidate::{IceCandidateInit, IceServerConfig};
use crate::model::peer::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A signaling message plus the room it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(flatten)]
    pub message: SignalMessage,
}

impl SignalEnvelope {
    pub fn new(rid: Option<String>, message: SignalMessage) -> Self {
        Self { rid, message }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcConfig {
    #[serde(rename = "iceServers", default)]
    pub ice_servers: Vec<IceServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SignalMessage {
    JoinRoom {
        uid: String,
        cid: String,
        user_cred: String,
        time_stamp: String,
        room_cred: String,
        start: String,
        len: u64,
        is_privileged: bool,
        auto_introduce: bool,
    },
    InRoom {
        sid: PeerId,
        #[serde(rename = "pc_config", default)]
        pc_config: PcConfig,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tie_breaker: Option<f64>,
    },
    Enter {
        mid: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<UserInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection: Option<ConnectionSettings>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tie_breaker: Option<f64>,
    },
    Welcome {
        mid: PeerId,
        target: PeerId,
        tie_breaker: f64,
        user: UserInfo,
        connection: ConnectionSettings,
    },
    Offer {
        mid: PeerId,
        target: PeerId,
        sdp: String,
    },
    Answer {
        mid: PeerId,
        target: PeerId,
        sdp: String,
    },
    Candidate {
        mid: PeerId,
        target: PeerId,
        candidate: String,
        sdp_mid: Option<String>,
        #[serde(rename = "sdpMLineIndex")]
        sdp_m_line_index: Option<u16>,
    },
    Bye {
        mid: PeerId,
    },
    Restart {
        mid: PeerId,
        target: PeerId,
        #[serde(default)]
        hard_restart: bool,
    },
    RoomLockEvent {
        mid: PeerId,
        lock: bool,
    },
    UpdateUserEvent {
        mid: PeerId,
        #[serde(default)]
        user_data: Value,
    },
    Public {
        mid: PeerId,
        data: Value,
    },
    Private {
        mid: PeerId,
        target: PeerId,
        data: Value,
    },
    Redirect {
        action: String,
        #[serde(default)]
        info: String,
        #[serde(default)]
        reason: String,
    },
}

impl SignalMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "joinRoom",
            Self::InRoom { .. } => "inRoom",
            Self::Enter { .. } => "enter",
            Self::Welcome { .. } => "welcome",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::Bye { .. } => "bye",
            Self::Restart { .. } => "restart",
            Self::RoomLockEvent { .. } => "roomLockEvent",
            Self::UpdateUserEvent { .. } => "updateUserEvent",
            Self::Public { .. } => "public",
            Self::Private { .. } => "private",
            Self::Redirect { .. } => "redirect",
        }
    }

    /// Session id of the participant that sent the message, when it carries one.
    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Self::Enter { mid, .. }
            | Self::Welcome { mid, .. }
            | Self::Offer { mid, .. }
            | Self::Answer { mid, .. }
            | Self::Candidate { mid, .. }
            | Self::Bye { mid }
            | Self::Restart { mid, .. }
            | Self::RoomLockEvent { mid, .. }
            | Self::UpdateUserEvent { mid, .. }
            | Self::Public { mid, .. }
            | Self::Private { mid, .. } => Some(mid),
            Self::JoinRoom { .. } | Self::InRoom { .. } | Self::Redirect { .. } => None,
        }
    }

    pub fn target(&self) -> Option<&PeerId> {
        match self {
            Self::Welcome { target, .. }
            | Self::Offer { target, .. }
            | Self::Answer { target, .. }
            | Self::Candidate { target, .. }
            | Self::Restart { target, .. }
            | Self::Private { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn candidate_init(&self) -> Option<IceCandidateInit> {
        match self {
            Self::Candidate {
                candidate,
                sdp_mid,
                sdp_m_line_index,
                ..
            } => Some(IceCandidateInit {
                candidate: candidate.clone(),
                sdp_mid: sdp_mid.clone(),
                sdp_m_line_index: *sdp_m_line_index,
            }),
            _ => None,
        }
    }
}
