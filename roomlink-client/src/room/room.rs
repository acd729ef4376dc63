use crate::bootstrap::{Bootstrap, fetch_with_retry};
use crate::events::{EventBus, RoomEvent};
use crate::room::room_command::{Reply, RoomCommand};
use crate::room::runtime::{RoomRuntime, RuntimeParts};
use crate::signaling::SignalingGateway;
use crate::transfer::TransferRequest;
use crate::transport::{LocalStream, MediaConstraints, MediaSource, PeerConnectionFactory};
use dashmap::DashMap;
use roomlink_core::{
    Error, PeerId, PeerInfo, ReadyState, Result, RoomConfig, RoomCredentials, RoomOptions,
    TransferId,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

/// External collaborators a room session is built on.
#[derive(Clone)]
pub struct RoomDeps {
    pub bootstrap: Arc<dyn Bootstrap>,
    pub gateway: Arc<dyn SignalingGateway>,
    pub connections: Arc<dyn PeerConnectionFactory>,
    pub media: Option<Arc<dyn MediaSource>>,
}

impl RoomDeps {
    pub fn new(
        bootstrap: Arc<dyn Bootstrap>,
        gateway: Arc<dyn SignalingGateway>,
        connections: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        Self {
            bootstrap,
            gateway,
            connections,
            media: None,
        }
    }

    pub fn with_media(mut self, media: Arc<dyn MediaSource>) -> Self {
        self.media = Some(media);
        self
    }
}

/// Handle to one room. Cloning is not needed: every operation takes `&self`
/// and is forwarded to the room's event loop.
pub struct RoomSession {
    config: Arc<RoomConfig>,
    deps: RoomDeps,
    events: EventBus<RoomEvent>,
    directory: Arc<DashMap<PeerId, PeerInfo>>,
    commands: Mutex<Option<mpsc::UnboundedSender<RoomCommand>>>,
}

impl RoomSession {
    pub fn new(config: RoomConfig, deps: RoomDeps) -> Self {
        Self {
            config: Arc::new(config),
            deps,
            events: EventBus::default(),
            directory: Arc::new(DashMap::new()),
            commands: Mutex::new(None),
        }
    }

    pub fn from_options(options: RoomOptions, deps: RoomDeps) -> Result<Self> {
        Ok(Self::new(options.validate()?, deps))
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Remote participants currently known to the room.
    pub fn peers(&self) -> Vec<(PeerId, PeerInfo)> {
        self.directory
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn peer(&self, peer_id: &PeerId) -> Option<PeerInfo> {
        self.directory.get(peer_id).map(|entry| entry.value().clone())
    }

    /// Bootstraps, acquires local media, opens signaling and sends `joinRoom`.
    ///
    /// Returns once the join request is on the wire; `InRoom` is reported
    /// through a `ReadyStateChange` event.
    pub async fn connect(&self) -> Result<()> {
        let mut commands = self.commands.lock().await;
        if commands.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Ok(());
        }

        match self.start().await {
            Ok(tx) => {
                *commands = Some(tx);
                Ok(())
            }
            Err(e) => {
                error!("Failed to connect to room '{}': {}", self.config.room, e);
                self.events
                    .emit(RoomEvent::ReadyStateChange(ReadyState::Error(e.to_string())));
                Err(e)
            }
        }
    }

    async fn start(&self) -> Result<mpsc::UnboundedSender<RoomCommand>> {
        if self.config.wants_media() && self.deps.media.is_none() {
            return Err(Error::Environment(
                "local media requested but no media source is available".to_string(),
            ));
        }

        self.events
            .emit(RoomEvent::ReadyStateChange(ReadyState::Loading));
        let credentials = fetch_with_retry(self.deps.bootstrap.as_ref(), &self.config).await?;
        let local_stream = self.acquire_media().await?;

        self.events
            .emit(RoomEvent::ReadyStateChange(ReadyState::Connecting));
        let url = self.signaling_url(&credentials)?;
        info!("Opening signaling channel to {}", url);
        let signals = self.deps.gateway.open(&url).await?;

        let mut runtime = RoomRuntime::new(RuntimeParts {
            config: Arc::clone(&self.config),
            credentials,
            gateway: Arc::clone(&self.deps.gateway),
            factory: Arc::clone(&self.deps.connections),
            local_stream,
            directory: Arc::clone(&self.directory),
            events: self.events.clone(),
        });
        if let Err(e) = runtime.join().await {
            if let Err(close_err) = self.deps.gateway.close().await {
                debug!("Closing signaling after a failed join: {}", close_err);
            }
            return Err(e);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(runtime.run(rx, signals));
        Ok(tx)
    }

    async fn acquire_media(&self) -> Result<Option<Arc<LocalStream>>> {
        if !self.config.wants_media() {
            return Ok(None);
        }
        let Some(media) = &self.deps.media else {
            return Ok(None);
        };
        let stream = media
            .acquire(MediaConstraints {
                audio: self.config.audio,
                video: self.config.video,
                stereo: self.config.enable_stereo,
            })
            .await?;
        info!("Acquired local stream {}", stream.id);
        Ok(Some(Arc::new(stream)))
    }

    fn signaling_url(&self, credentials: &RoomCredentials) -> Result<String> {
        self.config
            .signaling_url
            .clone()
            .or_else(|| credentials.signaling_url.clone())
            .ok_or_else(|| Error::Environment("no signaling url available".to_string()))
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> RoomCommand) -> Result<T> {
        let tx = self
            .commands
            .lock()
            .await
            .clone()
            .ok_or(Error::NotConnected)?;
        let (reply, response) = oneshot::channel();
        tx.send(build(reply)).map_err(|_| Error::NotConnected)?;
        response.await.map_err(|_| Error::NotConnected)?
    }

    /// Offers `request` to `peer_id`; resolves once the WRQ is queued.
    pub async fn transfer(&self, peer_id: &PeerId, request: TransferRequest) -> Result<TransferId> {
        let peer_id = peer_id.clone();
        self.request(|reply| RoomCommand::Transfer {
            peer_id,
            request,
            reply,
        })
        .await
    }

    pub async fn respond_transfer(
        &self,
        peer_id: &PeerId,
        transfer_id: &TransferId,
        accept: bool,
    ) -> Result<()> {
        let peer_id = peer_id.clone();
        let transfer_id = transfer_id.clone();
        self.request(|reply| RoomCommand::RespondTransfer {
            peer_id,
            transfer_id,
            accept,
            reply,
        })
        .await
    }

    pub async fn cancel_transfer(&self, peer_id: &PeerId, transfer_id: &TransferId) -> Result<()> {
        let peer_id = peer_id.clone();
        let transfer_id = transfer_id.clone();
        self.request(|reply| RoomCommand::CancelTransfer {
            peer_id,
            transfer_id,
            reply,
        })
        .await
    }

    /// Sends `data` over data channels; `None` reaches every peer.
    pub async fn send_p2p_message(&self, target: Option<&PeerId>, data: Value) -> Result<()> {
        let target = target.cloned();
        self.request(|reply| RoomCommand::SendP2pMessage {
            target,
            data,
            reply,
        })
        .await
    }

    /// Sends `data` through the signaling server.
    pub async fn send_message(&self, target: Option<&PeerId>, data: Value) -> Result<()> {
        let target = target.cloned();
        self.request(|reply| RoomCommand::SendMessage {
            target,
            data,
            reply,
        })
        .await
    }

    pub async fn lock_room(&self, lock: bool) -> Result<()> {
        self.request(|reply| RoomCommand::LockRoom { lock, reply })
            .await
    }

    pub async fn set_user_data(&self, data: Value) -> Result<()> {
        self.request(|reply| RoomCommand::SetUserData { data, reply })
            .await
    }

    pub async fn restart_peer(&self, peer_id: &PeerId, hard: bool) -> Result<()> {
        let peer_id = peer_id.clone();
        self.request(|reply| RoomCommand::RestartPeer {
            peer_id,
            hard,
            reply,
        })
        .await
    }

    /// Says `bye`, closes every peer and the signaling channel.
    pub async fn leave(&self) -> Result<()> {
        let result = self.request(|reply| RoomCommand::Leave { reply }).await;
        self.commands.lock().await.take();
        result
    }
}
