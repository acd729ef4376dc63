use crate::events::RoomEvent;
use crate::peer::peer_session::PeerSession;
use crate::transfer::{DataTransferChannel, TransferData, TransferRequest, UploadRequest};
use crate::transport::{ChannelPayload, DataChannel};
use roomlink_core::{
    DataChannelState, Error, MAIN_CHANNEL, PeerId, Result, TransferError, TransferId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

impl PeerSession {
    pub(crate) async fn open_main_channel(&mut self) {
        let usable = self
            .channels
            .get(MAIN_CHANNEL)
            .is_some_and(|c| c.ready_state() != DataChannelState::Closed);
        if usable {
            return;
        }
        match self.connection.create_data_channel(MAIN_CHANNEL).await {
            Ok(native) => self.insert_channel(native),
            Err(e) => {
                warn!("Failed to open main channel to {}: {}", self.peer_id, e);
                self.publish(RoomEvent::ChannelError {
                    peer_id: self.peer_id.clone(),
                    channel: MAIN_CHANNEL.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    pub(crate) fn on_remote_channel(&mut self, native: Arc<dyn DataChannel>) {
        debug!("Channel '{}' opened by {}", native.label(), self.peer_id);
        self.insert_channel(native);
    }

    fn insert_channel(&mut self, native: Arc<dyn DataChannel>) {
        let channel = DataTransferChannel::new(
            native,
            self.peer_id.clone(),
            self.ctx.local_id.clone(),
            self.ctx.timers.clone(),
        );
        let label = channel.id().to_string();
        if let Some(mut previous) = self.channels.insert(label, channel) {
            previous.on_closed(&mut self.outbox);
        }
    }

    pub(crate) async fn on_channel_state(&mut self, label: &str, state: DataChannelState) {
        let Some(channel) = self.channels.get_mut(label) else {
            debug!("State {:?} for unknown channel '{}'", state, label);
            return;
        };
        match state {
            DataChannelState::Open => channel.on_open(&mut self.outbox).await,
            DataChannelState::Closed => {
                channel.on_closed(&mut self.outbox);
                if channel.is_transient() {
                    self.channels.remove(label);
                }
            }
            DataChannelState::Connecting | DataChannelState::Closing => {}
        }
    }

    pub(crate) async fn on_channel_message(&mut self, label: &str, payload: ChannelPayload) {
        let Some(channel) = self.channels.get_mut(label) else {
            debug!("Frame on unknown channel '{}' from {}", label, self.peer_id);
            return;
        };
        channel.handle_payload(payload, &mut self.outbox).await;
        self.prune_channels();
    }

    /// Starts an upload to this peer.
    pub async fn transfer(&mut self, request: TransferRequest) -> Result<TransferId> {
        if self.dead {
            return Err(Error::PeerNotFound(self.peer_id.clone()));
        }
        if !self.requires_data_channel() {
            return Err(TransferError::ChannelNotFound(MAIN_CHANNEL.to_string()).into());
        }
        if request.data.is_empty() {
            return Err(TransferError::EmptyData.into());
        }

        let config = &self.ctx.config;
        let chunk_size = match &request.data {
            TransferData::Blob(_) => config
                .transfer
                .blob_chunk_size_for(&config.agent, &self.info.user.agent),
            TransferData::DataUrl(_) => config.transfer.data_url_chunk_size,
        };
        let upload = UploadRequest {
            id: TransferId::new(),
            name: request.name,
            data: request.data,
            chunk_size,
            timeout: request
                .timeout
                .unwrap_or_else(|| config.transfer.default_timeout()),
            is_private: request.is_private,
            agent: config.agent.clone(),
        };

        let label = match request.channel {
            Some(label) => label,
            None => {
                let label = Uuid::new_v4().to_string();
                let native = self.connection.create_data_channel(&label).await?;
                self.insert_channel(native);
                label
            }
        };
        let Some(channel) = self.channels.get_mut(&label) else {
            return Err(TransferError::ChannelNotFound(label).into());
        };
        let id = channel.start_upload(upload, &mut self.outbox).await?;
        Ok(id)
    }

    pub async fn respond_transfer(&mut self, transfer_id: &TransferId, accept: bool) -> Result<()> {
        let Some(channel) = self.channels.values_mut().find(|c| c.carries(transfer_id)) else {
            return Err(TransferError::NoPendingRequest.into());
        };
        channel.respond(accept, &mut self.outbox).await?;
        self.prune_channels();
        Ok(())
    }

    pub async fn cancel_transfer(&mut self, transfer_id: &TransferId) -> Result<()> {
        let Some(channel) = self.channels.values_mut().find(|c| c.carries(transfer_id)) else {
            return Err(TransferError::NoPendingRequest.into());
        };
        channel
            .cancel("transfer cancelled by user", &mut self.outbox)
            .await?;
        self.prune_channels();
        Ok(())
    }

    /// Sends a `MESSAGE` envelope over the main channel.
    pub async fn send_message(
        &mut self,
        data: Value,
        target: Option<PeerId>,
        is_private: bool,
    ) -> Result<()> {
        let Some(channel) = self.channels.get(MAIN_CHANNEL) else {
            return Err(TransferError::ChannelNotFound(MAIN_CHANNEL.to_string()).into());
        };
        channel.send_message(data, target, is_private).await?;
        Ok(())
    }

    pub async fn on_transfer_timeout(&mut self, label: &str, token: u64) {
        if self.dead {
            return;
        }
        let Some(channel) = self.channels.get_mut(label) else {
            return;
        };
        channel.on_timeout(token, &mut self.outbox).await;
        self.prune_channels();
    }

    pub(crate) async fn close_channels(&mut self) {
        for channel in self.channels.values_mut() {
            channel.close().await;
            channel.on_closed(&mut self.outbox);
        }
        self.channels.clear();
    }

    fn prune_channels(&mut self) {
        self.channels
            .retain(|_, c| !(c.is_transient() && c.ready_state() == DataChannelState::Closed));
    }
}
