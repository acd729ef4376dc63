use crate::events::RoomEvent;
use crate::health::StabilitySnapshot;
use crate::peer::candidates::{IncomingCandidates, OutgoingCandidates};
use crate::peer::peer_event::PeerEvent;
use crate::sdp::SdpOptions;
use crate::timer::TimerEvent;
use crate::transfer::DataTransferChannel;
use crate::transport::{
    ConnectionContext, LocalStream, PeerConnection, PeerConnectionFactory, TransportEvent,
    TransportEventKind,
};
use roomlink_core::{
    DataChannelState, IceConnectionState, IceGatheringState, IceServerConfig, MAIN_CHANNEL,
    PeerId, PeerInfo, Result, RoomConfig, SignalingState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Room-wide collaborators every `PeerSession` is built with.
#[derive(Clone)]
pub struct SessionContext {
    pub local_id: PeerId,
    pub config: Arc<RoomConfig>,
    pub factory: Arc<dyn PeerConnectionFactory>,
    pub local_stream: Option<Arc<LocalStream>>,
    pub ice_servers: Vec<IceServerConfig>,
    pub transport_tx: mpsc::UnboundedSender<TransportEvent>,
    pub timers: mpsc::UnboundedSender<TimerEvent>,
}

/// Negotiation and transport state for one remote participant.
///
/// Every method runs on the room loop. Results that must leave the session
/// (signaling, public events, health triggers) are queued as `PeerEvent`s
/// and collected with `drain_events`.
pub struct PeerSession {
    pub(crate) peer_id: PeerId,
    pub(crate) ctx: SessionContext,
    pub(crate) info: PeerInfo,
    pub(crate) is_offerer: bool,
    pub(crate) has_mcu: bool,
    pub(crate) connection: Arc<dyn PeerConnection>,
    pub(crate) generation: u64,
    pub(crate) errored: bool,
    pub(crate) dead: bool,
    pub(crate) ice_state: IceConnectionState,
    pub(crate) gathering_state: IceGatheringState,
    pub(crate) incoming: IncomingCandidates,
    pub(crate) outgoing: OutgoingCandidates,
    pub(crate) remote_description_set: bool,
    pub(crate) description_sent: bool,
    pub(crate) awaiting_gathering: bool,
    pub(crate) restart_pending: bool,
    pub(crate) trickle_disabled: bool,
    pub(crate) ice_failures: u32,
    pub(crate) retries: u32,
    pub(crate) channels: HashMap<String, DataTransferChannel>,
    pub(crate) outbox: Vec<PeerEvent>,
}

impl PeerSession {
    pub async fn create(peer_id: PeerId, info: PeerInfo, ctx: SessionContext) -> Result<Self> {
        let connection = open_connection(&ctx, &peer_id, 0).await?;
        debug!("Peer session created for {}", peer_id);

        Ok(Self {
            peer_id,
            ctx,
            info,
            is_offerer: false,
            has_mcu: false,
            connection,
            generation: 0,
            errored: false,
            dead: false,
            ice_state: IceConnectionState::New,
            gathering_state: IceGatheringState::New,
            incoming: IncomingCandidates::default(),
            outgoing: OutgoingCandidates::default(),
            remote_description_set: false,
            description_sent: false,
            awaiting_gathering: false,
            restart_pending: false,
            trickle_disabled: false,
            ice_failures: 0,
            retries: 0,
            channels: HashMap::new(),
            outbox: Vec::new(),
        })
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    pub fn set_info(&mut self, info: PeerInfo) {
        self.info = info;
    }

    pub fn is_offerer(&self) -> bool {
        self.is_offerer
    }

    pub fn set_offerer(&mut self, is_offerer: bool) {
        self.is_offerer = is_offerer;
    }

    pub fn set_has_mcu(&mut self, has_mcu: bool) {
        self.has_mcu = has_mcu;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn ice_failures(&self) -> u32 {
        self.ice_failures
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn bump_retries(&mut self) {
        self.retries = (self.retries + 1).min(self.ctx.config.health.max_retries);
    }

    pub fn incoming_candidates(&self) -> &IncomingCandidates {
        &self.incoming
    }

    pub fn outgoing_candidates(&self) -> &OutgoingCandidates {
        &self.outgoing
    }

    pub fn channel(&self, label: &str) -> Option<&DataTransferChannel> {
        self.channels.get(label)
    }

    /// Trickle ICE is used only when both sides announce it and it has not
    /// been turned off after repeated failures.
    pub fn trickle(&self) -> bool {
        !self.trickle_disabled
            && self.ctx.config.enable_ice_trickle
            && self.info.connection.trickle_ice
    }

    pub fn requires_data_channel(&self) -> bool {
        self.ctx.config.enable_data_channel && self.info.connection.data_channel
    }

    pub fn signaling_state(&self) -> SignalingState {
        if self.dead {
            SignalingState::Closed
        } else if self.errored {
            SignalingState::Error
        } else {
            self.connection.signaling_state()
        }
    }

    pub fn drain_events(&mut self) -> Vec<PeerEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub async fn stability(&self) -> StabilitySnapshot {
        let main_open = self.requires_data_channel().then(|| {
            self.channels
                .get(MAIN_CHANNEL)
                .is_some_and(|c| c.ready_state() == DataChannelState::Open)
        });
        StabilitySnapshot {
            signaling: self.signaling_state(),
            has_local: self.connection.local_description().await.is_some(),
            has_remote: self.connection.remote_description().await.is_some(),
            ice: self.ice_state,
            main_open,
        }
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.dead || event.generation != self.generation {
            debug!(
                "Dropping stale transport event for {} (generation {}, current {})",
                self.peer_id, event.generation, self.generation
            );
            return;
        }

        match event.kind {
            TransportEventKind::IceCandidate(candidate) => self.on_local_candidate(candidate).await,
            TransportEventKind::IceConnectionState(state) => {
                self.on_ice_connection_state(state).await
            }
            TransportEventKind::IceGatheringState(state) => {
                self.gathering_state = state;
                if state == IceGatheringState::Complete {
                    self.on_gathering_complete().await;
                }
            }
            TransportEventKind::SignalingState(state) => {
                self.publish(RoomEvent::SignalingState {
                    peer_id: self.peer_id.clone(),
                    state,
                });
            }
            TransportEventKind::DataChannel(native) => self.on_remote_channel(native),
            TransportEventKind::ChannelState { label, state } => {
                self.on_channel_state(&label, state).await
            }
            TransportEventKind::ChannelMessage { label, payload } => {
                self.on_channel_message(&label, payload).await
            }
            TransportEventKind::RemoteTrack { kind, id } => {
                self.publish(RoomEvent::RemoteTrack {
                    peer_id: self.peer_id.clone(),
                    kind,
                    track_id: id,
                });
            }
        }
    }

    /// Tears the session down. No transition is accepted afterwards.
    pub async fn close(&mut self) {
        if self.dead {
            return;
        }
        self.close_channels().await;
        self.dead = true;
        self.generation += 1;
        if let Err(e) = self.connection.close().await {
            debug!("Closing connection to {} failed: {}", self.peer_id, e);
        }
    }

    pub(crate) fn publish(&mut self, event: RoomEvent) {
        self.outbox.push(PeerEvent::Public(event));
    }

    pub(crate) fn sdp_options(&self) -> SdpOptions {
        SdpOptions::from_config(&self.ctx.config)
    }

    pub(crate) async fn replace_connection(&mut self) -> Result<()> {
        self.close_channels().await;
        if let Err(e) = self.connection.close().await {
            debug!("Closing old connection to {} failed: {}", self.peer_id, e);
        }
        self.generation += 1;
        self.connection = open_connection(&self.ctx, &self.peer_id, self.generation).await?;

        self.errored = false;
        self.ice_state = IceConnectionState::New;
        self.gathering_state = IceGatheringState::New;
        self.incoming = IncomingCandidates::default();
        self.outgoing = OutgoingCandidates::default();
        self.remote_description_set = false;
        self.description_sent = false;
        self.awaiting_gathering = false;
        self.restart_pending = false;
        Ok(())
    }
}

async fn open_connection(
    ctx: &SessionContext,
    peer_id: &PeerId,
    generation: u64,
) -> Result<Arc<dyn PeerConnection>> {
    let connection = ctx
        .factory
        .create(ConnectionContext {
            local_id: ctx.local_id.clone(),
            peer_id: peer_id.clone(),
            generation,
            ice_servers: ctx.ice_servers.clone(),
            events: ctx.transport_tx.clone(),
        })
        .await?;
    if let Some(stream) = &ctx.local_stream {
        connection.add_local_stream(stream).await?;
    }
    Ok(connection)
}
