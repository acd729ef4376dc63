use crate::events::RoomEvent;
use crate::peer::PeerEvent;
use crate::timer::{self, TimerEvent, TimerHandle};
use crate::transfer::chunk::{Chunk, TransferData, assemble};
use crate::transfer::transfer::{Transfer, TransferPhase};
use crate::transport::{ChannelPayload, DataChannel};
use roomlink_core::utils::DEFAULT_TRANSFER_TIMEOUT_SECS;
use roomlink_core::{
    AgentInfo, ChannelEnvelope, ChannelKind, DataChannelState, DataTransferState, PeerId,
    TransferDataType, TransferError, TransferId,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A transfer as requested through the room.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub name: String,
    pub data: TransferData,
    pub is_private: bool,
    /// Falls back to the configured default.
    pub timeout: Option<Duration>,
    /// Existing channel to send over; `None` opens a transient channel.
    pub channel: Option<String>,
}

impl TransferRequest {
    pub fn new(name: impl Into<String>, data: TransferData) -> Self {
        Self {
            name: name.into(),
            data,
            is_private: false,
            timeout: None,
            channel: None,
        }
    }

    pub fn over_channel(mut self, label: impl Into<String>) -> Self {
        self.channel = Some(label.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Everything needed to start an upload on a channel.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub id: TransferId,
    pub name: String,
    pub data: TransferData,
    pub chunk_size: usize,
    pub timeout: Duration,
    pub is_private: bool,
    pub agent: AgentInfo,
}

/// One data channel to a peer and the transfer protocol running over it.
///
/// `"main"` is the persistent messaging channel; any other label is a
/// transient channel opened for a single transfer and closed with it.
/// At most one transfer is in flight per channel.
pub struct DataTransferChannel {
    id: String,
    kind: ChannelKind,
    peer_id: PeerId,
    local_id: PeerId,
    native: Arc<dyn DataChannel>,
    state: DataChannelState,
    transfer: Option<Transfer>,
    pending_wrq: Option<ChannelEnvelope>,
    timers: mpsc::UnboundedSender<TimerEvent>,
    timer: Option<TimerHandle>,
    timer_token: u64,
}

impl DataTransferChannel {
    pub fn new(
        native: Arc<dyn DataChannel>,
        peer_id: PeerId,
        local_id: PeerId,
        timers: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let id = native.label();
        Self {
            kind: ChannelKind::for_label(&id),
            state: native.ready_state(),
            id,
            peer_id,
            local_id,
            native,
            transfer: None,
            pending_wrq: None,
            timers,
            timer: None,
            timer_token: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn ready_state(&self) -> DataChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DataChannelState::Open
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ChannelKind::Data
    }

    pub fn transfer(&self) -> Option<&Transfer> {
        self.transfer.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn carries(&self, transfer_id: &TransferId) -> bool {
        self.transfer.as_ref().is_some_and(|t| &t.id == transfer_id)
    }

    pub async fn start_upload(
        &mut self,
        request: UploadRequest,
        out: &mut Vec<PeerEvent>,
    ) -> Result<TransferId, TransferError> {
        if let Some(active) = &self.transfer {
            let err = TransferError::Busy(active.id.clone());
            warn!(
                "Channel '{}' to {} is busy, rejecting transfer {}",
                self.id, self.peer_id, request.id
            );
            let rejected = Transfer::upload(
                request.id,
                request.name,
                &request.data,
                request.chunk_size,
                request.timeout,
                request.is_private,
            );
            self.emit_state(out, &rejected, DataTransferState::Error, None, Some(err.to_string()));
            return Err(err);
        }
        if request.data.is_empty() {
            return Err(TransferError::EmptyData);
        }
        if matches!(
            self.state,
            DataChannelState::Closing | DataChannelState::Closed
        ) {
            return Err(TransferError::ChannelNotOpen(self.id.clone()));
        }

        let transfer = Transfer::upload(
            request.id.clone(),
            request.name,
            &request.data,
            request.chunk_size,
            request.timeout,
            request.is_private,
        );
        let wrq = ChannelEnvelope::Wrq {
            sender: self.local_id.clone(),
            target: self.peer_id.clone(),
            agent: request.agent.name,
            version: request.agent.version,
            is_private: transfer.is_private,
            id: transfer.id.clone(),
            name: transfer.name.clone(),
            size: transfer.size,
            data_type: transfer.data_type,
            chunk_size: transfer.chunk_size as u64,
            timeout: transfer.timeout.as_secs().max(1),
        };
        info!(
            "Uploading '{}' ({} bytes, {} chunks) to {} over '{}'",
            transfer.name,
            transfer.size,
            transfer.total_chunks(),
            self.peer_id,
            self.id
        );
        self.transfer = Some(transfer);

        if self.is_open() {
            self.send_wrq(wrq, out).await;
        } else {
            debug!("Channel '{}' not open yet, WRQ deferred", self.id);
            self.pending_wrq = Some(wrq);
        }
        Ok(request.id)
    }

    pub async fn on_open(&mut self, out: &mut Vec<PeerEvent>) {
        self.state = DataChannelState::Open;
        if let Some(wrq) = self.pending_wrq.take() {
            self.send_wrq(wrq, out).await;
        }
    }

    pub fn on_closed(&mut self, out: &mut Vec<PeerEvent>) {
        self.state = DataChannelState::Closed;
        self.pending_wrq = None;
        self.timer = None;
        if let Some(transfer) = self.transfer.take() {
            warn!("Channel '{}' closed during transfer {}", self.id, transfer.id);
            self.emit_state(
                out,
                &transfer,
                DataTransferState::Error,
                None,
                Some(TransferError::ChannelNotOpen(self.id.clone()).to_string()),
            );
        }
    }

    pub async fn handle_payload(&mut self, payload: ChannelPayload, out: &mut Vec<PeerEvent>) {
        match payload {
            ChannelPayload::Text(text) => match ChannelEnvelope::parse(&text) {
                Some(envelope) => self.handle_envelope(envelope, out).await,
                None => self.handle_chunk(Chunk::Text(text), out).await,
            },
            ChannelPayload::Binary(bytes) => self.handle_chunk(Chunk::Binary(bytes), out).await,
        }
    }

    /// Answers a pending `WRQ`.
    pub async fn respond(
        &mut self,
        accept: bool,
        out: &mut Vec<PeerEvent>,
    ) -> Result<(), TransferError> {
        let Some(transfer) = self
            .transfer
            .as_ref()
            .filter(|t| t.phase == TransferPhase::AwaitingResponse)
        else {
            return Err(TransferError::NoPendingRequest);
        };
        let ack = ChannelEnvelope::Ack {
            sender: self.local_id.clone(),
            ack_n: if accept { 0 } else { -1 },
            id: transfer.id.clone(),
            name: transfer.name.clone(),
        };

        if !accept {
            if let Err(e) = self.send_envelope(&ack).await {
                debug!("Reject ACK not delivered: {}", e);
            }
            self.timer = None;
            if let Some(transfer) = self.transfer.take() {
                self.emit_state(out, &transfer, DataTransferState::Rejected, None, None);
            }
            self.close_if_transient().await;
            return Ok(());
        }

        if let Err(e) = self.send_envelope(&ack).await {
            self.fail(out, e.to_string(), false).await;
            return Err(e);
        }
        if let Some(transfer) = self.transfer.as_mut() {
            transfer.phase = TransferPhase::Active;
            transfer.ack_n = 0;
        }
        self.arm_timer();
        if let Some(transfer) = &self.transfer {
            self.emit_state(out, transfer, DataTransferState::DownloadStarted, None, None);
        }
        Ok(())
    }

    /// Aborts the active transfer and tells the peer.
    pub async fn cancel(
        &mut self,
        reason: &str,
        out: &mut Vec<PeerEvent>,
    ) -> Result<(), TransferError> {
        let Some(transfer) = self.transfer.take() else {
            return Err(TransferError::NoPendingRequest);
        };
        self.timer = None;
        self.pending_wrq = None;

        let cancel = ChannelEnvelope::Cancel {
            sender: self.local_id.clone(),
            id: transfer.id.clone(),
            name: transfer.name.clone(),
            content: reason.to_string(),
        };
        if let Err(e) = self.send_envelope(&cancel).await {
            debug!("CANCEL not delivered: {}", e);
        }
        self.emit_state(
            out,
            &transfer,
            DataTransferState::Cancel,
            None,
            Some(reason.to_string()),
        );
        self.close_if_transient().await;
        Ok(())
    }

    pub async fn on_timeout(&mut self, token: u64, out: &mut Vec<PeerEvent>) {
        if token != self.timer_token || self.timer.is_none() {
            return;
        }
        self.timer = None;
        if self.transfer.is_none() {
            return;
        }
        warn!("Transfer on channel '{}' to {} timed out", self.id, self.peer_id);
        self.fail(out, "transfer timed out".to_string(), true).await;
    }

    pub async fn send_message(
        &self,
        data: Value,
        target: Option<PeerId>,
        is_private: bool,
    ) -> Result<(), TransferError> {
        let message = ChannelEnvelope::Message {
            sender: self.local_id.clone(),
            target,
            is_private,
            data,
        };
        self.send_envelope(&message).await
    }

    pub async fn close(&mut self) {
        if matches!(self.state, DataChannelState::Closed) {
            return;
        }
        self.state = DataChannelState::Closing;
        self.timer = None;
        if let Err(e) = self.native.close().await {
            debug!("Closing channel '{}' failed: {}", self.id, e);
        }
        self.state = DataChannelState::Closed;
    }

    async fn handle_envelope(&mut self, envelope: ChannelEnvelope, out: &mut Vec<PeerEvent>) {
        match envelope {
            ChannelEnvelope::Message {
                is_private, data, ..
            } => {
                out.push(PeerEvent::Public(RoomEvent::IncomingMessage {
                    peer_id: self.peer_id.clone(),
                    data,
                    is_private,
                    is_data_channel: true,
                }));
            }
            ChannelEnvelope::Wrq {
                is_private,
                id,
                name,
                size,
                data_type,
                chunk_size,
                timeout,
                agent,
                ..
            } => {
                debug!("WRQ '{}' from {} ({})", name, self.peer_id, agent);
                self.on_wrq(id, name, size, data_type, chunk_size, timeout, is_private, out)
                    .await;
            }
            ChannelEnvelope::Ack { ack_n, id, .. } => self.on_ack(id, ack_n, out).await,
            ChannelEnvelope::Cancel { id, content, .. } => {
                self.finish_remote(&id, DataTransferState::Cancel, content, out)
                    .await;
            }
            ChannelEnvelope::Error { id, content, .. } => {
                self.finish_remote(&id, DataTransferState::Error, content, out)
                    .await;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn on_wrq(
        &mut self,
        id: TransferId,
        name: String,
        size: u64,
        data_type: TransferDataType,
        chunk_size: u64,
        timeout: u64,
        is_private: bool,
        out: &mut Vec<PeerEvent>,
    ) {
        if self.transfer.is_some() {
            warn!(
                "WRQ {} from {} while channel '{}' is busy",
                id, self.peer_id, self.id
            );
            self.reject_request(id, name).await;
            return;
        }
        if size == 0 || chunk_size == 0 {
            let err = TransferError::InvalidRequest(format!(
                "size {size}, chunk size {chunk_size}"
            ));
            out.push(PeerEvent::Public(RoomEvent::ChannelError {
                peer_id: self.peer_id.clone(),
                channel: self.id.clone(),
                error: err.to_string(),
            }));
            self.reject_request(id, name).await;
            return;
        }

        let timeout = if timeout == 0 {
            DEFAULT_TRANSFER_TIMEOUT_SECS
        } else {
            timeout
        };
        let transfer = Transfer::download(
            id,
            name,
            data_type,
            size,
            chunk_size as usize,
            Duration::from_secs(timeout),
            is_private,
        );
        self.transfer = Some(transfer);
        self.arm_timer();
        if let Some(transfer) = &self.transfer {
            self.emit_state(out, transfer, DataTransferState::UploadRequest, None, None);
        }
    }

    async fn reject_request(&self, id: TransferId, name: String) {
        let ack = ChannelEnvelope::Ack {
            sender: self.local_id.clone(),
            ack_n: -1,
            id,
            name,
        };
        if let Err(e) = self.send_envelope(&ack).await {
            debug!("Reject ACK not delivered: {}", e);
        }
    }

    async fn on_ack(&mut self, id: TransferId, ack_n: i64, out: &mut Vec<PeerEvent>) {
        let Some(transfer) = self.transfer.as_mut() else {
            debug!("ACK {} on idle channel '{}'", ack_n, self.id);
            return;
        };
        if transfer.id != id || !transfer.is_upload() {
            debug!("ACK for unknown transfer {} on '{}'", id, self.id);
            return;
        }

        if ack_n < 0 {
            info!("Transfer {} rejected by {}", id, self.peer_id);
            self.timer = None;
            if let Some(transfer) = self.transfer.take() {
                self.emit_state(out, &transfer, DataTransferState::Rejected, None, None);
            }
            self.close_if_transient().await;
            return;
        }
        if ack_n != transfer.ack_n + 1 {
            debug!("Out-of-order ACK {} (last {})", ack_n, transfer.ack_n);
            return;
        }

        transfer.ack_n = ack_n;
        transfer.phase = TransferPhase::Active;
        let total = transfer.total_chunks() as i64;

        if ack_n >= total {
            self.timer = None;
            if let Some(transfer) = self.transfer.take() {
                info!("Upload {} to {} completed", transfer.id, self.peer_id);
                self.emit_state(out, &transfer, DataTransferState::UploadCompleted, None, None);
            }
            self.close_if_transient().await;
            return;
        }

        let chunk = transfer.chunks[ack_n as usize].clone();
        let state = if ack_n == 0 {
            DataTransferState::UploadStarted
        } else {
            DataTransferState::Uploading
        };
        if let Some(transfer) = &self.transfer {
            self.emit_state(out, transfer, state, None, None);
        }

        match self.send_chunk(chunk).await {
            Ok(()) => self.arm_timer(),
            Err(e) => self.fail(out, e.to_string(), true).await,
        }
    }

    async fn handle_chunk(&mut self, chunk: Chunk, out: &mut Vec<PeerEvent>) {
        let Some(transfer) = self.transfer.as_mut() else {
            debug!("Frame on idle channel '{}' dropped", self.id);
            return;
        };
        if transfer.is_upload() || transfer.phase != TransferPhase::Active {
            debug!("Unexpected frame on channel '{}' dropped", self.id);
            return;
        }

        let well_formed = !chunk.is_empty()
            && matches!(
                (transfer.data_type, &chunk),
                (TransferDataType::Blob, Chunk::Binary(_))
                    | (TransferDataType::DataUrl, Chunk::Text(_))
            );
        if well_formed {
            transfer.received_bytes += chunk.size();
            transfer.chunks.push(chunk);
        } else {
            warn!(
                "Skipping malformed chunk {} of transfer {}",
                transfer.ack_n + 1,
                transfer.id
            );
        }
        transfer.ack_n += 1;

        let ack = ChannelEnvelope::Ack {
            sender: self.local_id.clone(),
            ack_n: transfer.ack_n,
            id: transfer.id.clone(),
            name: transfer.name.clone(),
        };
        let complete = transfer.is_download_complete();

        if let Err(e) = self.send_envelope(&ack).await {
            self.fail(out, e.to_string(), false).await;
            return;
        }

        if complete {
            self.timer = None;
            if let Some(transfer) = self.transfer.take() {
                info!(
                    "Download {} from {} completed ({} bytes)",
                    transfer.id, self.peer_id, transfer.received_bytes
                );
                let data = assemble(transfer.data_type, &transfer.chunks);
                self.emit_state(
                    out,
                    &transfer,
                    DataTransferState::DownloadCompleted,
                    Some(data),
                    None,
                );
            }
        } else {
            self.arm_timer();
            if let Some(transfer) = &self.transfer {
                self.emit_state(out, transfer, DataTransferState::Downloading, None, None);
            }
        }
    }

    async fn finish_remote(
        &mut self,
        id: &TransferId,
        state: DataTransferState,
        content: String,
        out: &mut Vec<PeerEvent>,
    ) {
        if !self.carries(id) {
            debug!("{:?} for unknown transfer {} ignored", state, id);
            return;
        }
        self.timer = None;
        self.pending_wrq = None;
        if let Some(transfer) = self.transfer.take() {
            self.emit_state(out, &transfer, state, None, Some(content));
        }
        self.close_if_transient().await;
    }

    async fn send_wrq(&mut self, wrq: ChannelEnvelope, out: &mut Vec<PeerEvent>) {
        match self.send_envelope(&wrq).await {
            Ok(()) => {
                if let Some(transfer) = self.transfer.as_mut() {
                    transfer.phase = TransferPhase::AwaitingAck;
                }
                self.arm_timer();
            }
            Err(e) => self.fail(out, e.to_string(), false).await,
        }
    }

    /// Fails the active transfer locally; `notify` also sends an `ERROR` envelope.
    async fn fail(&mut self, out: &mut Vec<PeerEvent>, reason: String, notify: bool) {
        self.timer = None;
        self.pending_wrq = None;
        let Some(transfer) = self.transfer.take() else {
            return;
        };
        if notify {
            let error = ChannelEnvelope::Error {
                sender: self.local_id.clone(),
                id: transfer.id.clone(),
                name: transfer.name.clone(),
                content: reason.clone(),
                is_upload_error: transfer.is_upload(),
            };
            if let Err(e) = self.send_envelope(&error).await {
                debug!("ERROR envelope not delivered: {}", e);
            }
        }
        self.emit_state(out, &transfer, DataTransferState::Error, None, Some(reason));
        self.close_if_transient().await;
    }

    async fn close_if_transient(&mut self) {
        if self.is_transient() {
            self.close().await;
        }
    }

    fn arm_timer(&mut self) {
        let Some(transfer) = &self.transfer else {
            return;
        };
        self.timer_token += 1;
        self.timer = Some(timer::arm(
            transfer.timeout,
            &self.timers,
            TimerEvent::TransferTimeout {
                peer_id: self.peer_id.clone(),
                channel: self.id.clone(),
                token: self.timer_token,
            },
        ));
    }

    async fn send_envelope(&self, envelope: &ChannelEnvelope) -> Result<(), TransferError> {
        if !self.is_open() {
            return Err(TransferError::ChannelNotOpen(self.id.clone()));
        }
        let json = envelope
            .to_json()
            .map_err(|e| TransferError::Send(e.to_string()))?;
        self.native
            .send_text(json)
            .await
            .map_err(|e| TransferError::Send(e.to_string()))
    }

    async fn send_chunk(&self, chunk: Chunk) -> Result<(), TransferError> {
        if !self.is_open() {
            return Err(TransferError::ChannelNotOpen(self.id.clone()));
        }
        let sent = match chunk {
            Chunk::Binary(bytes) => self.native.send_binary(bytes).await,
            Chunk::Text(text) => self.native.send_text(text).await,
        };
        sent.map_err(|e| TransferError::Send(e.to_string()))
    }

    fn emit_state(
        &self,
        out: &mut Vec<PeerEvent>,
        transfer: &Transfer,
        state: DataTransferState,
        data: Option<TransferData>,
        error: Option<String>,
    ) {
        out.push(PeerEvent::Public(RoomEvent::DataTransferState {
            peer_id: self.peer_id.clone(),
            transfer_id: transfer.id.clone(),
            state,
            info: transfer.info(),
            data,
            error,
        }));
    }
}
