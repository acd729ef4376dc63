use crate::events::{HandshakeStep, RoomEvent};
use crate::peer::peer_event::PeerEvent;
use crate::peer::peer_session::PeerSession;
use crate::sdp;
use crate::transport::OfferOptions;
use roomlink_core::{Error, IceGatheringState, SessionDescription, SignalingState};
use tracing::{debug, info, warn};

impl PeerSession {
    /// Starts a negotiation as the offerer. Only valid from `stable`.
    pub async fn handshake_offer(&mut self) {
        if self.dead {
            debug!("Offer to {} ignored: session closed", self.peer_id);
            return;
        }
        let state = self.signaling_state();
        if state != SignalingState::Stable {
            debug!("Offer to {} ignored in state {:?}", self.peer_id, state);
            return;
        }

        self.outbox.push(PeerEvent::HandshakeStarted);
        if self.requires_data_channel() {
            self.open_main_channel().await;
        }

        let ice_restart = self.restart_pending || self.ice_state.needs_ice_restart();
        info!(
            "Creating offer for {} (ice restart: {})",
            self.peer_id, ice_restart
        );
        let offer = match self
            .connection
            .create_offer(OfferOptions { ice_restart })
            .await
        {
            Ok(offer) => offer,
            Err(e) => {
                self.handshake_error(e);
                return;
            }
        };
        self.restart_pending = false;
        if ice_restart {
            self.restart_gathering();
        }
        self.apply_local_description(offer, HandshakeStep::Offer)
            .await;
    }

    /// Answers a remote offer. Only valid from `stable`.
    pub async fn handshake_answer(&mut self, offer: SessionDescription) {
        if self.dead {
            debug!("Offer from {} ignored: session closed", self.peer_id);
            return;
        }
        let state = self.signaling_state();
        if state != SignalingState::Stable {
            debug!("Offer from {} ignored in state {:?}", self.peer_id, state);
            return;
        }
        if !offer.is_offer() {
            warn!("Expected an offer from {}, got an answer", self.peer_id);
            return;
        }

        // A new remote ufrag means the offerer restarted ICE; our answer
        // gathers again too.
        let ice_restart = match self.connection.remote_description().await {
            Some(previous) => sdp::ice_ufrag(&previous.sdp) != sdp::ice_ufrag(&offer.sdp),
            None => false,
        };

        self.outbox.push(PeerEvent::HandshakeStarted);
        if let Err(e) = self.connection.set_remote_description(offer).await {
            self.handshake_error(e);
            return;
        }
        self.remote_description_set = true;
        self.flush_incoming().await;

        let answer = match self.connection.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                self.handshake_error(e);
                return;
            }
        };
        if ice_restart {
            self.restart_gathering();
        }
        self.apply_local_description(answer, HandshakeStep::Answer)
            .await;
    }

    /// Applies the remote answer to our offer. Only valid from `have-local-offer`.
    pub async fn handshake_complete(&mut self, answer: SessionDescription) {
        if self.dead {
            debug!("Answer from {} ignored: session closed", self.peer_id);
            return;
        }
        let state = self.signaling_state();
        if state != SignalingState::HaveLocalOffer {
            debug!("Answer from {} ignored in state {:?}", self.peer_id, state);
            return;
        }

        if let Err(e) = self.connection.set_remote_description(answer).await {
            self.handshake_error(e);
            return;
        }
        self.remote_description_set = true;
        self.flush_incoming().await;
        info!("Handshake with {} complete", self.peer_id);
    }

    async fn apply_local_description(&mut self, desc: SessionDescription, step: HandshakeStep) {
        let desc = self.rewrite(desc);
        if let Err(e) = self.connection.set_local_description(desc.clone()).await {
            self.handshake_error(e);
            return;
        }

        self.description_sent = false;
        self.publish(RoomEvent::HandshakeProgress {
            peer_id: self.peer_id.clone(),
            step,
            error: None,
        });

        if self.trickle() {
            self.emit_local_description(desc);
        } else if self.gathering_state == IceGatheringState::Complete {
            let complete = self.connection.local_description().await.unwrap_or(desc);
            let complete = self.rewrite(complete);
            self.emit_local_description(complete);
        } else {
            debug!(
                "Holding local description for {} until gathering completes",
                self.peer_id
            );
            self.awaiting_gathering = true;
        }
    }

    /// Only a `Complete` reported after the next `setLocalDescription`
    /// counts for the new candidate set.
    fn restart_gathering(&mut self) {
        self.gathering_state = IceGatheringState::New;
        self.outgoing.gathered.clear();
    }

    pub(crate) fn emit_local_description(&mut self, desc: SessionDescription) {
        self.description_sent = true;
        self.awaiting_gathering = false;
        self.outbox.push(PeerEvent::LocalDescription(desc));

        if self.trickle() {
            for candidate in std::mem::take(&mut self.outgoing.pending) {
                self.outbox.push(PeerEvent::LocalCandidate(candidate));
            }
        } else {
            self.outgoing.pending.clear();
        }
    }

    /// End of candidates: a held description is sent now, with every
    /// gathered candidate embedded.
    pub(crate) async fn on_gathering_complete(&mut self) {
        self.gathering_state = IceGatheringState::Complete;
        if !self.awaiting_gathering || self.description_sent {
            return;
        }
        match self.connection.local_description().await {
            Some(desc) => {
                let desc = self.rewrite(desc);
                self.emit_local_description(desc);
            }
            None => warn!(
                "Gathering completed for {} without a local description",
                self.peer_id
            ),
        }
    }

    pub(crate) fn handshake_error(&mut self, err: Error) {
        warn!("Handshake with {} failed: {}", self.peer_id, err);
        self.errored = true;
        self.publish(RoomEvent::HandshakeProgress {
            peer_id: self.peer_id.clone(),
            step: HandshakeStep::Error,
            error: Some(err.to_string()),
        });
        self.publish(RoomEvent::SignalingState {
            peer_id: self.peer_id.clone(),
            state: SignalingState::Error,
        });
    }

    pub(crate) fn rewrite(&self, desc: SessionDescription) -> SessionDescription {
        SessionDescription {
            kind: desc.kind,
            sdp: sdp::rewrite(&desc.sdp, &self.sdp_options()),
        }
    }
}
