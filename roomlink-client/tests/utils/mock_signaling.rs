use async_trait::async_trait;
use roomlink_client::{GatewayEvent, SignalingGateway};
use roomlink_core::{Error, PcConfig, PeerId, Result, SignalEnvelope, SignalMessage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct HubState {
    clients: HashMap<PeerId, mpsc::UnboundedSender<GatewayEvent>>,
    /// Every envelope a client sent, in order.
    log: Vec<(PeerId, SignalEnvelope)>,
    /// Clients that closed their gateway.
    closed: Vec<PeerId>,
    refuse_joins: bool,
}

/// In-process signaling server routing envelopes between mock gateways.
#[derive(Clone, Default)]
pub struct MockSignalingHub {
    state: Arc<Mutex<HubState>>,
}

impl MockSignalingHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway for one client; `inRoom` assigns it `sid` and `tie_breaker`.
    pub fn gateway(&self, sid: &str, tie_breaker: Option<f64>) -> Arc<MockGateway> {
        Arc::new(MockGateway {
            hub: self.clone(),
            sid: PeerId::from(sid),
            tie_breaker,
            incoming: Mutex::new(None),
        })
    }

    /// Pushes a server-originated envelope to one client.
    pub fn inject(&self, to: &PeerId, envelope: SignalEnvelope) {
        if let Some(tx) = self.state.lock().unwrap().clients.get(to) {
            let _ = tx.send(GatewayEvent::Message(envelope));
        }
    }

    /// Drops the connection of one client as if the server went away.
    pub fn disconnect(&self, id: &PeerId, reason: &str) {
        if let Some(tx) = self.state.lock().unwrap().clients.remove(id) {
            let _ = tx.send(GatewayEvent::Disconnected(Some(reason.to_string())));
        }
    }

    /// Makes every further `joinRoom` fail to send.
    pub fn refuse_joins(&self) {
        self.state.lock().unwrap().refuse_joins = true;
    }

    pub fn was_closed(&self, id: &PeerId) -> bool {
        self.state.lock().unwrap().closed.contains(id)
    }

    pub fn sent_by(&self, id: &PeerId) -> Vec<SignalMessage> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(from, _)| from == id)
            .map(|(_, envelope)| envelope.message.clone())
            .collect()
    }

    pub fn count_sent(&self, id: &PeerId, kind: &str) -> usize {
        self.sent_by(id).iter().filter(|m| m.kind() == kind).count()
    }

    fn route(&self, from: &PeerId, envelope: SignalEnvelope) {
        let mut state = self.state.lock().unwrap();
        state.log.push((from.clone(), envelope.clone()));

        match envelope.message.target() {
            Some(target) => {
                if let Some(tx) = state.clients.get(target) {
                    let _ = tx.send(GatewayEvent::Message(envelope));
                }
            }
            None => {
                for (id, tx) in state.clients.iter() {
                    if id != from {
                        let _ = tx.send(GatewayEvent::Message(envelope.clone()));
                    }
                }
            }
        }
    }
}

pub struct MockGateway {
    hub: MockSignalingHub,
    sid: PeerId,
    tie_breaker: Option<f64>,
    incoming: Mutex<Option<mpsc::UnboundedSender<GatewayEvent>>>,
}

impl MockGateway {
    pub fn sid(&self) -> &PeerId {
        &self.sid
    }
}

#[async_trait]
impl SignalingGateway for MockGateway {
    async fn open(&self, _url: &str) -> Result<mpsc::UnboundedReceiver<GatewayEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.incoming.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send(&self, envelope: SignalEnvelope) -> Result<()> {
        tracing::debug!("[MockSignaling] {} sends {}", self.sid, envelope.message.kind());

        if let SignalMessage::JoinRoom { .. } = envelope.message {
            if self.hub.state.lock().unwrap().refuse_joins {
                return Err(Error::Signaling("joinRoom refused".to_string()));
            }
            let Some(tx) = self.incoming.lock().unwrap().clone() else {
                return Err(Error::Signaling("gateway not open".to_string()));
            };
            {
                let mut state = self.hub.state.lock().unwrap();
                state.log.push((self.sid.clone(), envelope.clone()));
                state.clients.insert(self.sid.clone(), tx.clone());
            }
            let in_room = SignalEnvelope::new(
                envelope.rid.clone(),
                SignalMessage::InRoom {
                    sid: self.sid.clone(),
                    pc_config: PcConfig::default(),
                    tie_breaker: self.tie_breaker,
                },
            );
            let _ = tx.send(GatewayEvent::Message(in_room));
            return Ok(());
        }

        self.hub.route(&self.sid, envelope);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.hub.state.lock().unwrap();
            state.clients.remove(&self.sid);
            state.closed.push(self.sid.clone());
        }
        self.incoming.lock().unwrap().take();
        Ok(())
    }
}
