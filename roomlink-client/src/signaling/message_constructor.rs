use roomlink_core::{
    ConnectionSettings, IceCandidateInit, PeerId, RoomCredentials, SdpType, SessionDescription,
    SignalEnvelope, SignalMessage, UserInfo,
};
use serde_json::Value;

/// Builds outgoing signaling envelopes stamped with the room id and our session id.
#[derive(Debug, Clone)]
pub struct MessageConstructor {
    rid: String,
    mid: PeerId,
}

impl MessageConstructor {
    pub fn new(rid: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            mid: PeerId::new(""),
        }
    }

    /// Session id assigned by `inRoom`.
    pub fn set_mid(&mut self, mid: PeerId) {
        self.mid = mid;
    }

    pub fn mid(&self) -> &PeerId {
        &self.mid
    }

    fn wrap(&self, message: SignalMessage) -> SignalEnvelope {
        SignalEnvelope::new(Some(self.rid.clone()), message)
    }

    pub fn join_room(&self, creds: &RoomCredentials) -> SignalEnvelope {
        self.wrap(SignalMessage::JoinRoom {
            uid: creds.uid.clone(),
            cid: creds.cid.clone(),
            user_cred: creds.user_cred.clone(),
            time_stamp: creds.time_stamp.clone(),
            room_cred: creds.room_cred.clone(),
            start: creds.start.clone(),
            len: creds.len,
            is_privileged: creds.is_privileged,
            auto_introduce: creds.auto_introduce,
        })
    }

    pub fn enter(
        &self,
        user: UserInfo,
        connection: ConnectionSettings,
        tie_breaker: f64,
    ) -> SignalEnvelope {
        self.wrap(SignalMessage::Enter {
            mid: self.mid.clone(),
            user: Some(user),
            connection: Some(connection),
            tie_breaker: Some(tie_breaker),
        })
    }

    pub fn welcome(
        &self,
        target: &PeerId,
        tie_breaker: f64,
        user: UserInfo,
        connection: ConnectionSettings,
    ) -> SignalEnvelope {
        self.wrap(SignalMessage::Welcome {
            mid: self.mid.clone(),
            target: target.clone(),
            tie_breaker,
            user,
            connection,
        })
    }

    /// `offer` or `answer`, depending on the description.
    pub fn description(&self, target: &PeerId, desc: SessionDescription) -> SignalEnvelope {
        let mid = self.mid.clone();
        let target = target.clone();
        let message = match desc.kind {
            SdpType::Offer => SignalMessage::Offer {
                mid,
                target,
                sdp: desc.sdp,
            },
            SdpType::Answer => SignalMessage::Answer {
                mid,
                target,
                sdp: desc.sdp,
            },
        };
        self.wrap(message)
    }

    pub fn candidate(&self, target: &PeerId, candidate: IceCandidateInit) -> SignalEnvelope {
        self.wrap(SignalMessage::Candidate {
            mid: self.mid.clone(),
            target: target.clone(),
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_m_line_index: candidate.sdp_m_line_index,
        })
    }

    pub fn bye(&self) -> SignalEnvelope {
        self.wrap(SignalMessage::Bye {
            mid: self.mid.clone(),
        })
    }

    pub fn restart(&self, target: &PeerId, hard_restart: bool) -> SignalEnvelope {
        self.wrap(SignalMessage::Restart {
            mid: self.mid.clone(),
            target: target.clone(),
            hard_restart,
        })
    }

    pub fn room_lock(&self, lock: bool) -> SignalEnvelope {
        self.wrap(SignalMessage::RoomLockEvent {
            mid: self.mid.clone(),
            lock,
        })
    }

    pub fn update_user(&self, user_data: Value) -> SignalEnvelope {
        self.wrap(SignalMessage::UpdateUserEvent {
            mid: self.mid.clone(),
            user_data,
        })
    }

    /// `private` when a target is given, `public` otherwise.
    pub fn chat(&self, target: Option<&PeerId>, data: Value) -> SignalEnvelope {
        let mid = self.mid.clone();
        let message = match target {
            Some(target) => SignalMessage::Private {
                mid,
                target: target.clone(),
                data,
            },
            None => SignalMessage::Public { mid, data },
        };
        self.wrap(message)
    }
}
