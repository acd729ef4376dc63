use crate::events::RoomEvent;
use crate::peer::peer_event::PeerEvent;
use crate::peer::peer_session::PeerSession;
use roomlink_core::SignalingState;
use tracing::{debug, info};

impl PeerSession {
    /// Recovers a broken or stalled connection.
    ///
    /// A hard restart replaces the connection object; a soft one keeps it
    /// and relies on an ICE restart offer.
    pub async fn reconnect(&mut self, hard_restart: bool, is_self_initiated: bool) {
        if self.dead {
            return;
        }
        info!(
            "Reconnecting {} (hard: {}, self initiated: {})",
            self.peer_id, hard_restart, is_self_initiated
        );
        self.publish(RoomEvent::PeerRestart {
            peer_id: self.peer_id.clone(),
            is_self_initiated,
            hard: hard_restart,
        });

        if hard_restart {
            if let Err(e) = self.replace_connection().await {
                self.handshake_error(e);
                return;
            }
            if is_self_initiated {
                self.outbox.push(PeerEvent::RestartRequest { hard: true });
            }
            if self.is_offerer {
                self.handshake_offer().await;
            }
            return;
        }

        // `have-remote-offer` never outlives `handshake_answer`: the answer is
        // set in the same call, and a failure in between leaves `error`.
        if self.signaling_state() == SignalingState::HaveLocalOffer {
            if let Some(desc) = self.connection.local_description().await {
                debug!("Re-sending pending local description to {}", self.peer_id);
                let desc = self.rewrite(desc);
                self.outbox.push(PeerEvent::LocalDescription(desc));
                self.outbox.push(PeerEvent::HandshakeStarted);
                return;
            }
        }

        if is_self_initiated {
            self.restart_pending = true;
            self.outbox.push(PeerEvent::RestartRequest { hard: false });
        }
    }

    /// The next offer carries `iceRestart`.
    pub fn request_ice_restart(&mut self) {
        self.restart_pending = true;
    }
}
