use crate::events::{EventBus, RoomEvent};
use crate::health::{HealthMonitor, compute_timeout};
use crate::peer::{PeerEvent, PeerSession, SessionContext};
use crate::room::room_command::RoomCommand;
use crate::room::room_state::RoomState;
use crate::signaling::{GatewayEvent, MessageConstructor, SignalingGateway};
use crate::timer::TimerEvent;
use crate::transport::{LocalStream, PeerConnectionFactory, TransportEvent};
use dashmap::DashMap;
use roomlink_core::{
    ConnectionSettings, Error, PeerId, PeerInfo, ReadyState, Result, RoomConfig,
    RoomCredentials, SignalEnvelope, UserInfo,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub(crate) struct RuntimeParts {
    pub config: Arc<RoomConfig>,
    pub credentials: RoomCredentials,
    pub gateway: Arc<dyn SignalingGateway>,
    pub factory: Arc<dyn PeerConnectionFactory>,
    pub local_stream: Option<Arc<LocalStream>>,
    pub directory: Arc<DashMap<PeerId, PeerInfo>>,
    pub events: EventBus<RoomEvent>,
}

/// State owned by a room's event loop task.
pub(crate) struct RoomRuntime {
    pub(crate) config: Arc<RoomConfig>,
    pub(crate) credentials: RoomCredentials,
    pub(crate) gateway: Arc<dyn SignalingGateway>,
    pub(crate) factory: Arc<dyn PeerConnectionFactory>,
    pub(crate) local_stream: Option<Arc<LocalStream>>,
    pub(crate) constructor: MessageConstructor,
    pub(crate) state: RoomState,
    pub(crate) peers: HashMap<PeerId, PeerSession>,
    pub(crate) directory: Arc<DashMap<PeerId, PeerInfo>>,
    pub(crate) health: HealthMonitor,
    pub(crate) events: EventBus<RoomEvent>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    pub(crate) stopped: bool,
}

/// Health inputs read before a peer's events are dispatched.
struct HealthInputs {
    is_offerer: bool,
    trickle: bool,
    retries: u32,
}

impl RoomRuntime {
    pub(crate) fn new(parts: RuntimeParts) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let rid = parts.credentials.room_key.clone();
        let user_data = parts.config.user_data.clone();

        Self {
            constructor: MessageConstructor::new(rid.clone()),
            state: RoomState {
                ready_state: ReadyState::Connecting,
                ..RoomState::new(rid, user_data)
            },
            health: HealthMonitor::new(timer_tx.clone()),
            config: parts.config,
            credentials: parts.credentials,
            gateway: parts.gateway,
            factory: parts.factory,
            local_stream: parts.local_stream,
            peers: HashMap::new(),
            directory: parts.directory,
            events: parts.events,
            transport_tx,
            transport_rx,
            timer_tx,
            timer_rx,
            stopped: false,
        }
    }

    /// Sends `joinRoom`; the loop takes over once `inRoom` arrives.
    pub(crate) async fn join(&mut self) -> Result<()> {
        let join = self.constructor.join_room(&self.credentials);
        self.gateway.send(join).await
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RoomCommand>,
        mut signals: mpsc::UnboundedReceiver<GatewayEvent>,
    ) {
        info!("Room '{}' event loop started", self.state.rid);

        while !self.stopped {
            tokio::select! {
                Some(cmd) = commands.recv() => self.handle_command(cmd).await,

                evt = signals.recv() => match evt {
                    Some(GatewayEvent::Message(envelope)) => self.handle_signal(envelope).await,
                    Some(GatewayEvent::Disconnected(reason)) => {
                        self.on_signaling_lost(reason).await
                    }
                    None => self.on_signaling_lost(None).await,
                },

                Some(evt) = self.transport_rx.recv() => self.handle_transport_event(evt).await,

                Some(evt) = self.timer_rx.recv() => self.handle_timer(evt).await,
            }
        }

        info!("Room '{}' event loop finished", self.state.rid);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Transfer {
                peer_id,
                request,
                reply,
            } => {
                let result = match self.peers.get_mut(&peer_id) {
                    Some(peer) => peer.transfer(request).await,
                    None => Err(Error::PeerNotFound(peer_id.clone())),
                };
                self.flush(&peer_id).await;
                let _ = reply.send(result);
            }

            RoomCommand::RespondTransfer {
                peer_id,
                transfer_id,
                accept,
                reply,
            } => {
                let result = match self.peers.get_mut(&peer_id) {
                    Some(peer) => peer.respond_transfer(&transfer_id, accept).await,
                    None => Err(Error::PeerNotFound(peer_id.clone())),
                };
                self.flush(&peer_id).await;
                let _ = reply.send(result);
            }

            RoomCommand::CancelTransfer {
                peer_id,
                transfer_id,
                reply,
            } => {
                let result = match self.peers.get_mut(&peer_id) {
                    Some(peer) => peer.cancel_transfer(&transfer_id).await,
                    None => Err(Error::PeerNotFound(peer_id.clone())),
                };
                self.flush(&peer_id).await;
                let _ = reply.send(result);
            }

            RoomCommand::SendP2pMessage {
                target,
                data,
                reply,
            } => {
                let result = self.send_p2p_message(target, data).await;
                let _ = reply.send(result);
            }

            RoomCommand::SendMessage {
                target,
                data,
                reply,
            } => {
                let result = match self.require_in_room() {
                    Ok(()) => {
                        let envelope = self.constructor.chat(target.as_ref(), data);
                        self.gateway.send(envelope).await
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }

            RoomCommand::LockRoom { lock, reply } => {
                let result = match self.require_in_room() {
                    Ok(()) => {
                        self.state.locked = lock;
                        let sent = self.gateway.send(self.constructor.room_lock(lock)).await;
                        self.events.emit(RoomEvent::RoomLock {
                            peer_id: self.constructor.mid().clone(),
                            locked: lock,
                        });
                        sent
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }

            RoomCommand::SetUserData { data, reply } => {
                self.state.user_data = data.clone();
                let result = match self.require_in_room() {
                    Ok(()) => self.gateway.send(self.constructor.update_user(data)).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }

            RoomCommand::RestartPeer {
                peer_id,
                hard,
                reply,
            } => {
                let result = match self.peers.get_mut(&peer_id) {
                    Some(peer) => {
                        peer.reconnect(hard, true).await;
                        Ok(())
                    }
                    None => Err(Error::PeerNotFound(peer_id.clone())),
                };
                self.flush(&peer_id).await;
                let _ = reply.send(result);
            }

            RoomCommand::Leave { reply } => {
                self.leave().await;
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn send_p2p_message(
        &mut self,
        target: Option<PeerId>,
        data: serde_json::Value,
    ) -> Result<()> {
        self.require_in_room()?;
        let Some(target) = target else {
            for (peer_id, peer) in self.peers.iter_mut() {
                if let Err(e) = peer.send_message(data.clone(), None, false).await {
                    debug!("Broadcast to {} skipped: {}", peer_id, e);
                }
            }
            return Ok(());
        };
        let Some(peer) = self.peers.get_mut(&target) else {
            return Err(Error::PeerNotFound(target));
        };
        peer.send_message(data, Some(target.clone()), true).await
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        let peer_id = event.peer_id.clone();
        let Some(peer) = self.peers.get_mut(&peer_id) else {
            debug!("Transport event for unknown peer {}", peer_id);
            return;
        };
        peer.handle_transport_event(event).await;
        self.flush(&peer_id).await;
    }

    async fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Health { peer_id, token } => self.on_health_expired(&peer_id, token).await,
            TimerEvent::TransferTimeout {
                peer_id,
                channel,
                token,
            } => {
                if let Some(peer) = self.peers.get_mut(&peer_id) {
                    peer.on_transfer_timeout(&channel, token).await;
                    self.flush(&peer_id).await;
                }
            }
        }
    }

    async fn on_health_expired(&mut self, peer_id: &PeerId, token: u64) {
        if !self.health.is_current(peer_id, token) {
            return;
        }
        let Some(peer) = self.peers.get_mut(peer_id) else {
            self.health.clear(peer_id);
            return;
        };

        let snapshot = peer.stability().await;
        if snapshot.is_stable() {
            info!("Connection to {} is healthy", peer_id);
            self.health.mark_healthy(peer_id);
            return;
        }

        warn!(
            "Connection to {} not stable in time ({:?}), restarting",
            peer_id, snapshot
        );
        self.health.clear(peer_id);
        peer.bump_retries();
        if self.state.has_mcu {
            self.rejoin().await;
        } else {
            peer.reconnect(true, true).await;
            self.flush(peer_id).await;
        }
    }

    /// Drains a peer's outbox into signaling, the health monitor and the event bus.
    pub(crate) async fn flush(&mut self, peer_id: &PeerId) {
        let Some(peer) = self.peers.get_mut(peer_id) else {
            return;
        };
        let events = peer.drain_events();
        let inputs = HealthInputs {
            is_offerer: peer.is_offerer(),
            trickle: peer.trickle(),
            retries: peer.retries(),
        };
        self.dispatch(peer_id, events, inputs).await;
    }

    async fn dispatch(&mut self, peer_id: &PeerId, events: Vec<PeerEvent>, inputs: HealthInputs) {
        for event in events {
            match event {
                PeerEvent::LocalDescription(desc) => {
                    let envelope = self.constructor.description(peer_id, desc);
                    self.send(envelope).await;
                }
                PeerEvent::LocalCandidate(candidate) => {
                    let envelope = self.constructor.candidate(peer_id, candidate);
                    self.send(envelope).await;
                }
                PeerEvent::RestartRequest { hard } => {
                    let envelope = self.constructor.restart(peer_id, hard);
                    self.send(envelope).await;
                }
                PeerEvent::HandshakeStarted => {
                    let timeout = compute_timeout(
                        inputs.is_offerer,
                        inputs.trickle,
                        self.state.has_mcu,
                        inputs.retries,
                        &self.config.health,
                    );
                    self.health.start(peer_id, timeout);
                }
                PeerEvent::Public(event) => self.events.emit(event),
            }
        }
    }

    pub(crate) async fn send(&self, envelope: SignalEnvelope) {
        let kind = envelope.message.kind();
        if let Err(e) = self.gateway.send(envelope).await {
            warn!("Failed to send '{}': {}", kind, e);
        }
    }

    pub(crate) fn session_context(&self) -> SessionContext {
        SessionContext {
            local_id: self.constructor.mid().clone(),
            config: Arc::clone(&self.config),
            factory: Arc::clone(&self.factory),
            local_stream: self.local_stream.clone(),
            ice_servers: self.state.ice_servers.clone(),
            transport_tx: self.transport_tx.clone(),
            timers: self.timer_tx.clone(),
        }
    }

    pub(crate) fn self_user(&self) -> UserInfo {
        UserInfo {
            agent: self.config.agent.clone(),
            data: self.state.user_data.clone(),
        }
    }

    pub(crate) fn self_connection(&self) -> ConnectionSettings {
        self.config.connection_settings()
    }

    pub(crate) fn set_ready_state(&mut self, ready_state: ReadyState) {
        if self.state.ready_state == ready_state {
            return;
        }
        self.state.ready_state = ready_state.clone();
        self.events.emit(RoomEvent::ReadyStateChange(ready_state));
    }

    fn require_in_room(&self) -> Result<()> {
        if self.state.in_room() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Closes and forgets a peer, publishing what its teardown produced.
    pub(crate) async fn remove_peer(&mut self, peer_id: &PeerId) {
        let Some(mut peer) = self.peers.remove(peer_id) else {
            return;
        };
        peer.close().await;
        let events = peer.drain_events();
        for event in events {
            if let PeerEvent::Public(event) = event {
                self.events.emit(event);
            }
        }
        self.health.clear(peer_id);
        self.directory.remove(peer_id);
        info!("Peer {} left", peer_id);
        self.events.emit(RoomEvent::PeerLeft {
            peer_id: peer_id.clone(),
        });
    }

    pub(crate) async fn close_all_peers(&mut self) {
        let ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        for peer_id in ids {
            self.remove_peer(&peer_id).await;
        }
        self.health.clear_all();
    }

    /// With an MCU, an unhealthy peer means the whole session is re-established.
    async fn rejoin(&mut self) {
        warn!("Rejoining room '{}'", self.state.rid);
        self.close_all_peers().await;
        self.set_ready_state(ReadyState::Connecting);
        let join = self.constructor.join_room(&self.credentials);
        self.send(join).await;
    }

    pub(crate) async fn leave(&mut self) {
        if self.state.in_room() {
            let bye = self.constructor.bye();
            self.send(bye).await;
        }
        self.close_all_peers().await;
        if let Err(e) = self.gateway.close().await {
            debug!("Closing signaling failed: {}", e);
        }
        self.set_ready_state(ReadyState::Disconnected);
        self.stopped = true;
    }

    async fn on_signaling_lost(&mut self, reason: Option<String>) {
        if self.stopped {
            return;
        }
        self.close_all_peers().await;
        if self.state.self_id.is_none() {
            let reason = reason.unwrap_or_else(|| "signaling closed before joining".to_string());
            error!("Signaling lost before inRoom: {}", reason);
            self.set_ready_state(ReadyState::Error(reason));
        } else {
            warn!("Signaling lost: {:?}", reason);
            self.set_ready_state(ReadyState::Disconnected);
        }
        self.stopped = true;
    }
}
