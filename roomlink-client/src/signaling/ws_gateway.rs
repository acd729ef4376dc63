use crate::signaling::gateway::{GatewayEvent, SignalingGateway};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use roomlink_core::{Error, Result, SignalEnvelope};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// `SignalingGateway` over a WebSocket carrying one JSON message per text frame.
#[derive(Default)]
pub struct WsSignalingGateway {
    outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WsSignalingGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalingGateway for WsSignalingGateway {
    async fn open(&self, url: &str) -> Result<mpsc::UnboundedReceiver<GatewayEvent>> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| Error::Signaling(format!("failed to connect to {url}: {e}")))?;
        info!("Signaling connected to {}", url);

        let (mut sender, mut receiver) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sender.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut reason = None;
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<SignalEnvelope>(&text) {
                            Ok(envelope) => {
                                if event_tx.send(GatewayEvent::Message(envelope)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("Invalid signaling message: {}", e),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }
            debug!("Signaling socket closed");
            let _ = event_tx.send(GatewayEvent::Disconnected(reason));
        });

        *self.outgoing.lock().await = Some(out_tx);
        Ok(event_rx)
    }

    async fn send(&self, envelope: SignalEnvelope) -> Result<()> {
        let json = serde_json::to_string(&envelope)?;
        let guard = self.outgoing.lock().await;
        let Some(tx) = guard.as_ref() else {
            return Err(Error::NotConnected);
        };
        tx.send(Message::Text(json))
            .map_err(|_| Error::Signaling("signaling socket closed".to_string()))
    }

    async fn close(&self) -> Result<()> {
        if let Some(tx) = self.outgoing.lock().await.take() {
            let _ = tx.send(Message::Close(None));
        }
        Ok(())
    }
}
