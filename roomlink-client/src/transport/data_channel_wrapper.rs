use crate::transport::peer_connection::{ChannelPayload, ConnectionContext, DataChannel};
use crate::transport::transport_event::TransportEventKind;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use roomlink_core::{DataChannelState, Error, Result};
use std::sync::Arc;
use tracing::debug;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;

/// `DataChannel` over a `webrtc` crate channel.
pub struct WebRtcDataChannel {
    inner: Arc<RTCDataChannel>,
}

impl WebRtcDataChannel {
    /// Wraps the native channel and routes its callbacks into the room loop.
    pub fn wire(inner: Arc<RTCDataChannel>, ctx: &ConnectionContext) -> Arc<Self> {
        let label = inner.label().to_string();

        let ctx_open = ctx.clone();
        let label_open = label.clone();
        inner.on_open(Box::new(move || {
            Box::pin(async move {
                debug!("data channel '{}' open for {}", label_open, ctx_open.peer_id);
                ctx_open.emit(TransportEventKind::ChannelState {
                    label: label_open,
                    state: DataChannelState::Open,
                });
            })
        }));

        let ctx_close = ctx.clone();
        let label_close = label.clone();
        inner.on_close(Box::new(move || {
            let ctx = ctx_close.clone();
            let label = label_close.clone();
            Box::pin(async move {
                ctx.emit(TransportEventKind::ChannelState {
                    label,
                    state: DataChannelState::Closed,
                });
            })
        }));

        let ctx_msg = ctx.clone();
        inner.on_message(Box::new(move |msg: DataChannelMessage| {
            let ctx = ctx_msg.clone();
            let label = label.clone();
            Box::pin(async move {
                let payload = if msg.is_string {
                    ChannelPayload::Text(String::from_utf8_lossy(&msg.data).into_owned())
                } else {
                    ChannelPayload::Binary(msg.data)
                };
                ctx.emit(TransportEventKind::ChannelMessage { label, payload });
            })
        }));

        Arc::new(Self { inner })
    }
}

fn convert_state(state: RTCDataChannelState) -> DataChannelState {
    match state {
        RTCDataChannelState::Open => DataChannelState::Open,
        RTCDataChannelState::Closing => DataChannelState::Closing,
        RTCDataChannelState::Closed => DataChannelState::Closed,
        _ => DataChannelState::Connecting,
    }
}

fn native(err: anyhow::Error) -> Error {
    Error::Native(format!("{err:#}"))
}

#[async_trait]
impl DataChannel for WebRtcDataChannel {
    fn label(&self) -> String {
        self.inner.label().to_string()
    }

    fn ready_state(&self) -> DataChannelState {
        convert_state(self.inner.ready_state())
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.inner
            .send_text(text)
            .await
            .context("failed to send text frame")
            .map_err(native)?;
        Ok(())
    }

    async fn send_binary(&self, data: Bytes) -> Result<()> {
        self.inner
            .send(&data)
            .await
            .context("failed to send binary frame")
            .map_err(native)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner
            .close()
            .await
            .context("failed to close data channel")
            .map_err(native)
    }
}
