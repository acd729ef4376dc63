use crate::events::{HandshakeStep, RoomEvent};
use crate::peer::PeerSession;
use crate::room::room_state::filter_ice_servers;
use crate::room::runtime::RoomRuntime;
use crate::room::tie_breaker::{Contender, initial_tie_breaker, is_offerer};
use roomlink_core::{
    PcConfig, PeerId, PeerInfo, ReadyState, Result, SessionDescription, SignalEnvelope,
    SignalMessage,
};
use serde_json::Value;
use tracing::{debug, info, warn};

impl RoomRuntime {
    pub(crate) async fn handle_signal(&mut self, envelope: SignalEnvelope) {
        let SignalEnvelope { rid, message } = envelope;
        if let Some(rid) = &rid {
            if *rid != self.state.rid {
                debug!("Dropping '{}' for room {}", message.kind(), rid);
                return;
            }
        }

        match message {
            SignalMessage::InRoom {
                sid,
                pc_config,
                tie_breaker,
            } => self.on_in_room(sid, pc_config, tie_breaker).await,
            SignalMessage::Redirect {
                action,
                info,
                reason,
            } => self.on_redirect(action, info, reason).await,
            message => {
                let Some(self_id) = self.state.self_id.clone() else {
                    debug!("Dropping '{}' received before inRoom", message.kind());
                    return;
                };
                if message.sender() == Some(&self_id) {
                    return;
                }
                if message.target().is_some_and(|target| *target != self_id) {
                    debug!("Dropping '{}' addressed to another peer", message.kind());
                    return;
                }
                self.on_peer_message(message).await;
            }
        }
    }

    async fn on_peer_message(&mut self, message: SignalMessage) {
        match message {
            SignalMessage::Enter {
                mid,
                user,
                connection,
                ..
            } => {
                let info = PeerInfo {
                    user: user.unwrap_or_default(),
                    connection: connection.unwrap_or_default(),
                };
                self.on_enter(mid, info).await;
            }
            SignalMessage::Welcome {
                mid,
                tie_breaker,
                user,
                connection,
                ..
            } => {
                self.on_welcome(mid, tie_breaker, PeerInfo { user, connection })
                    .await
            }
            SignalMessage::Offer { mid, sdp, .. } => {
                if let Some(peer) = self.known_peer(&mid, "offer") {
                    peer.handshake_answer(SessionDescription::offer(sdp)).await;
                    self.flush(&mid).await;
                }
            }
            SignalMessage::Answer { mid, sdp, .. } => {
                if let Some(peer) = self.known_peer(&mid, "answer") {
                    peer.handshake_complete(SessionDescription::answer(sdp))
                        .await;
                    self.flush(&mid).await;
                }
            }
            message @ SignalMessage::Candidate { .. } => {
                let (Some(mid), Some(candidate)) =
                    (message.sender().cloned(), message.candidate_init())
                else {
                    return;
                };
                if let Some(peer) = self.known_peer(&mid, "candidate") {
                    peer.add_remote_candidate(candidate).await;
                    self.flush(&mid).await;
                }
            }
            SignalMessage::Bye { mid } => self.remove_peer(&mid).await,
            SignalMessage::Restart {
                mid, hard_restart, ..
            } => self.on_restart(mid, hard_restart).await,
            SignalMessage::RoomLockEvent { mid, lock } => {
                self.state.locked = lock;
                self.events.emit(RoomEvent::RoomLock {
                    peer_id: mid,
                    locked: lock,
                });
            }
            SignalMessage::UpdateUserEvent { mid, user_data } => {
                self.on_user_update(mid, user_data)
            }
            SignalMessage::Public { mid, data } => {
                self.events.emit(RoomEvent::IncomingMessage {
                    peer_id: mid,
                    data,
                    is_private: false,
                    is_data_channel: false,
                });
            }
            SignalMessage::Private { mid, data, .. } => {
                self.events.emit(RoomEvent::IncomingMessage {
                    peer_id: mid,
                    data,
                    is_private: true,
                    is_data_channel: false,
                });
            }
            other => debug!("Ignoring '{}' from the server", other.kind()),
        }
    }

    async fn on_in_room(&mut self, sid: PeerId, pc_config: PcConfig, tie_breaker: Option<f64>) {
        info!("Joined room '{}' as {}", self.state.rid, sid);
        self.constructor.set_mid(sid.clone());
        self.state.self_id = Some(sid.clone());

        let servers = if pc_config.ice_servers.is_empty() {
            self.config.ice_servers.clone()
        } else {
            pc_config.ice_servers
        };
        self.state.ice_servers = filter_ice_servers(servers, &self.config.candidate_filter);
        self.state.tie_breaker = tie_breaker.unwrap_or_else(initial_tie_breaker);

        self.set_ready_state(ReadyState::InRoom);
        self.events.emit(RoomEvent::PeerJoined {
            peer_id: sid,
            info: PeerInfo {
                user: self.self_user(),
                connection: self.self_connection(),
            },
            is_self: true,
        });

        let enter =
            self.constructor
                .enter(self.self_user(), self.self_connection(), self.state.tie_breaker);
        self.send(enter).await;
    }

    async fn on_enter(&mut self, peer_id: PeerId, info: PeerInfo) {
        if peer_id.is_mcu() {
            self.mark_mcu();
        }
        if self.peers.contains_key(&peer_id) {
            info!("Peer {} entered again, resetting its session", peer_id);
            self.remove_peer(&peer_id).await;
        }
        if let Err(e) = self.ensure_peer(&peer_id, info).await {
            self.peer_setup_failed(&peer_id, e);
            return;
        }

        self.events.emit(RoomEvent::HandshakeProgress {
            peer_id: peer_id.clone(),
            step: HandshakeStep::Enter,
            error: None,
        });
        let welcome = self.constructor.welcome(
            &peer_id,
            self.state.tie_breaker,
            self.self_user(),
            self.self_connection(),
        );
        self.send(welcome).await;
    }

    async fn on_welcome(&mut self, peer_id: PeerId, tie_breaker: f64, info: PeerInfo) {
        if peer_id.is_mcu() {
            self.mark_mcu();
        }
        if let Err(e) = self.ensure_peer(&peer_id, info.clone()).await {
            self.peer_setup_failed(&peer_id, e);
            return;
        }
        self.events.emit(RoomEvent::HandshakeProgress {
            peer_id: peer_id.clone(),
            step: HandshakeStep::Welcome,
            error: None,
        });

        let local_id = self.constructor.mid().clone();
        let offers = is_offerer(
            Contender {
                id: &local_id,
                tie_breaker: self.state.tie_breaker,
                agent: &self.config.agent,
            },
            Contender {
                id: &peer_id,
                tie_breaker,
                agent: &info.user.agent,
            },
            &self.config.answerer_agents,
        );

        let Some(peer) = self.peers.get_mut(&peer_id) else {
            return;
        };
        peer.set_offerer(offers);
        if offers {
            debug!("Offering to {}", peer_id);
            peer.handshake_offer().await;
            self.flush(&peer_id).await;
        } else {
            debug!("Answering {}, handing the offer over", peer_id);
            let welcome = self.constructor.welcome(
                &peer_id,
                self.state.tie_breaker,
                self.self_user(),
                self.self_connection(),
            );
            self.send(welcome).await;
        }
    }

    async fn on_restart(&mut self, peer_id: PeerId, hard: bool) {
        let Some(peer) = self.known_peer(&peer_id, "restart") else {
            return;
        };
        peer.reconnect(hard, false).await;
        let offerer = peer.is_offerer();
        if offerer && !hard {
            peer.request_ice_restart();
            peer.handshake_offer().await;
        }
        self.flush(&peer_id).await;

        if !offerer {
            let welcome = self.constructor.welcome(
                &peer_id,
                self.state.tie_breaker,
                self.self_user(),
                self.self_connection(),
            );
            self.send(welcome).await;
        }
    }

    fn on_user_update(&mut self, peer_id: PeerId, user_data: Value) {
        if let Some(mut entry) = self.directory.get_mut(&peer_id) {
            entry.user.data = user_data.clone();
        }
        if let Some(peer) = self.peers.get_mut(&peer_id) {
            let mut info = peer.info().clone();
            info.user.data = user_data.clone();
            peer.set_info(info);
        }
        self.events.emit(RoomEvent::PeerUpdated { peer_id, user_data });
    }

    async fn on_redirect(&mut self, action: String, info: String, reason: String) {
        warn!("Redirect '{}' from server: {} ({})", action, info, reason);
        let rejected = action == "reject";
        self.events.emit(RoomEvent::Redirect {
            action,
            info: info.clone(),
            reason,
        });
        if rejected {
            self.set_ready_state(ReadyState::Error(info));
            self.leave_after_reject().await;
        }
    }

    async fn leave_after_reject(&mut self) {
        self.close_all_peers().await;
        if let Err(e) = self.gateway.close().await {
            debug!("Closing signaling failed: {}", e);
        }
        self.stopped = true;
    }

    /// Creates the session on first contact; later contacts refresh its info.
    async fn ensure_peer(&mut self, peer_id: &PeerId, info: PeerInfo) -> Result<()> {
        self.directory.insert(peer_id.clone(), info.clone());
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.set_info(info);
            return Ok(());
        }

        let mut peer = PeerSession::create(peer_id.clone(), info.clone(), self.session_context())
            .await?;
        peer.set_has_mcu(self.state.has_mcu);
        self.peers.insert(peer_id.clone(), peer);
        info!("Peer {} joined", peer_id);
        self.events.emit(RoomEvent::PeerJoined {
            peer_id: peer_id.clone(),
            info,
            is_self: false,
        });
        Ok(())
    }

    fn peer_setup_failed(&mut self, peer_id: &PeerId, err: roomlink_core::Error) {
        warn!("Could not create a session for {}: {}", peer_id, err);
        self.directory.remove(peer_id);
        self.events.emit(RoomEvent::HandshakeProgress {
            peer_id: peer_id.clone(),
            step: HandshakeStep::Error,
            error: Some(err.to_string()),
        });
    }

    fn mark_mcu(&mut self) {
        if self.state.has_mcu {
            return;
        }
        info!("Room '{}' is served by an MCU", self.state.rid);
        self.state.has_mcu = true;
        for peer in self.peers.values_mut() {
            peer.set_has_mcu(true);
        }
    }

    fn known_peer(&mut self, peer_id: &PeerId, kind: &str) -> Option<&mut PeerSession> {
        let peer = self.peers.get_mut(peer_id);
        if peer.is_none() {
            warn!("Dropping '{}' from unknown peer {}", kind, peer_id);
        }
        peer
    }
}
