use crate::events::RoomEvent;
use crate::peer::candidates::is_allowed;
use crate::peer::peer_event::PeerEvent;
use crate::peer::peer_session::PeerSession;
use roomlink_core::IceCandidateInit;
use roomlink_core::IceConnectionState;
use roomlink_core::utils::ICE_FAILURE_LIMIT;
use tracing::{debug, info, warn};

impl PeerSession {
    /// A locally gathered candidate; `None` marks the end of gathering.
    pub(crate) async fn on_local_candidate(&mut self, candidate: Option<IceCandidateInit>) {
        let Some(candidate) = candidate else {
            self.on_gathering_complete().await;
            return;
        };
        if !is_allowed(&self.ctx.config.candidate_filter, &candidate) {
            debug!(
                "Dropping local {:?} candidate for {}",
                candidate.candidate_type(),
                self.peer_id
            );
            return;
        }

        self.outgoing.gathered.push(candidate.clone());
        if !self.trickle() {
            return;
        }
        if self.description_sent {
            self.outbox.push(PeerEvent::LocalCandidate(candidate));
        } else {
            self.outgoing.pending.push(candidate);
        }
    }

    /// A candidate relayed by the remote side.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidateInit) {
        if self.dead {
            return;
        }
        if !is_allowed(&self.ctx.config.candidate_filter, &candidate) {
            debug!(
                "Dropping remote {:?} candidate from {}",
                candidate.candidate_type(),
                self.peer_id
            );
            return;
        }
        if !self.remote_description_set {
            self.incoming.queue.push(candidate);
            return;
        }
        self.apply_remote_candidate(candidate).await;
    }

    pub(crate) async fn flush_incoming(&mut self) {
        let queued = std::mem::take(&mut self.incoming.queue);
        if !queued.is_empty() {
            debug!("Flushing {} queued candidates for {}", queued.len(), self.peer_id);
        }
        for candidate in queued {
            self.apply_remote_candidate(candidate).await;
        }
    }

    async fn apply_remote_candidate(&mut self, candidate: IceCandidateInit) {
        match self.connection.add_ice_candidate(candidate.clone()).await {
            Ok(()) => self.incoming.success.push(candidate),
            Err(e) => {
                warn!("Failed to add candidate from {}: {}", self.peer_id, e);
                self.incoming.failure.push(candidate);
            }
        }
    }

    pub(crate) async fn on_ice_connection_state(&mut self, state: IceConnectionState) {
        info!("ICE connection state for {}: {:?}", self.peer_id, state);
        self.ice_state = state;
        self.publish(RoomEvent::IceConnectionState {
            peer_id: self.peer_id.clone(),
            state,
        });

        match state {
            IceConnectionState::Connected | IceConnectionState::Completed => {
                self.ice_failures = 0;
            }
            IceConnectionState::Disconnected => self.reconnect(false, true).await,
            IceConnectionState::Failed => {
                self.ice_failures += 1;
                if self.ice_failures >= ICE_FAILURE_LIMIT && !self.has_mcu && self.trickle() {
                    warn!(
                        "ICE failed {} times for {}, disabling trickle ICE",
                        self.ice_failures, self.peer_id
                    );
                    self.trickle_disabled = true;
                    self.reconnect(true, true).await;
                } else {
                    self.reconnect(false, true).await;
                }
            }
            _ => {}
        }
    }
}
