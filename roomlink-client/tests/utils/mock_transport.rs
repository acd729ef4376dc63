use async_trait::async_trait;
use bytes::Bytes;
use roomlink_client::{
    ChannelPayload, ConnectionContext, DataChannel, LocalStream, OfferOptions, PeerConnection,
    PeerConnectionFactory, TransportEventKind,
};
use roomlink_core::{
    ChannelEnvelope, DataChannelState, Error, IceCandidateInit, IceConnectionState,
    IceGatheringState, PeerId, Result, SdpType, SessionDescription, SignalingState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

type Link = (PeerId, PeerId);

#[derive(Default)]
struct NetworkState {
    manual_ice: bool,
    /// Latest connection per (local, remote).
    connections: HashMap<Link, Arc<MockPeerConnection>>,
    /// Channels waiting for both ends to connect, keyed by their creator's link.
    pending: HashMap<Link, Vec<(Arc<MockDataChannel>, Arc<MockDataChannel>)>>,
    /// Every channel end ever handed out, by owner link and label.
    channels: Vec<(Link, Arc<MockDataChannel>)>,
    offers: Vec<(Link, OfferOptions)>,
    created: HashMap<Link, usize>,
    failing_answers: usize,
}

/// Loopback "network" connecting mock peer connections of several rooms.
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<MockConnectionFactory> {
        Arc::new(MockConnectionFactory {
            network: self.clone(),
        })
    }

    /// With manual ICE, connections never reach `connected` on their own.
    pub fn set_manual_ice(&self, manual: bool) {
        self.state.lock().unwrap().manual_ice = manual;
    }

    /// The next `count` answers created on any connection fail.
    pub fn fail_next_answers(&self, count: usize) {
        self.state.lock().unwrap().failing_answers = count;
    }

    pub fn connection(&self, local: &str, remote: &str) -> Option<Arc<MockPeerConnection>> {
        self.state
            .lock()
            .unwrap()
            .connections
            .get(&(PeerId::from(local), PeerId::from(remote)))
            .cloned()
    }

    /// Number of connection objects created for the link, including replaced ones.
    pub fn connections_created(&self, local: &str, remote: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .created
            .get(&(PeerId::from(local), PeerId::from(remote)))
            .copied()
            .unwrap_or_default()
    }

    pub fn offers(&self, local: &str, remote: &str) -> Vec<OfferOptions> {
        let link = (PeerId::from(local), PeerId::from(remote));
        self.state
            .lock()
            .unwrap()
            .offers
            .iter()
            .filter(|(l, _)| *l == link)
            .map(|(_, options)| *options)
            .collect()
    }

    /// Transfer-protocol envelopes sent by `local` to `remote` on channel `label`.
    pub fn envelopes_sent(&self, local: &str, remote: &str, label: &str) -> Vec<ChannelEnvelope> {
        let link = (PeerId::from(local), PeerId::from(remote));
        let ends: Vec<Arc<MockDataChannel>> = self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|(l, c)| *l == link && c.label == label)
            .map(|(_, c)| Arc::clone(c))
            .collect();
        ends.iter()
            .flat_map(|c| c.sent())
            .filter_map(|payload| match payload {
                ChannelPayload::Text(text) => serde_json::from_str(&text).ok(),
                ChannelPayload::Binary(_) => None,
            })
            .collect()
    }

    /// Binary frames sent by `local` to `remote` on channel `label`.
    pub fn binary_frames_sent(&self, local: &str, remote: &str, label: &str) -> Vec<Bytes> {
        let link = (PeerId::from(local), PeerId::from(remote));
        let ends: Vec<Arc<MockDataChannel>> = self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .filter(|(l, c)| *l == link && c.label == label)
            .map(|(_, c)| Arc::clone(c))
            .collect();
        ends.iter()
            .flat_map(|c| c.sent())
            .filter_map(|payload| match payload {
                ChannelPayload::Binary(data) => Some(data),
                ChannelPayload::Text(_) => None,
            })
            .collect()
    }

    /// Hands `payload` to `to`'s end of channel `label` as if `from` had sent it.
    pub fn deliver(&self, to: &str, from: &str, label: &str, payload: ChannelPayload) {
        let link = (PeerId::from(to), PeerId::from(from));
        let end = self
            .state
            .lock()
            .unwrap()
            .channels
            .iter()
            .rev()
            .find(|(l, c)| *l == link && c.label == label)
            .map(|(_, c)| Arc::clone(c));
        if let Some(end) = end {
            end.receive(payload);
        }
    }

    fn take_answer_failure(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.failing_answers == 0 {
            return false;
        }
        state.failing_answers -= 1;
        true
    }

    fn register(&self, connection: Arc<MockPeerConnection>) {
        let link = connection.link();
        let mut state = self.state.lock().unwrap();
        *state.created.entry(link.clone()).or_default() += 1;
        state.pending.remove(&link);
        state.connections.insert(link, connection);
    }

    fn manual_ice(&self) -> bool {
        self.state.lock().unwrap().manual_ice
    }

    fn record_offer(&self, link: Link, options: OfferOptions) {
        self.state.lock().unwrap().offers.push((link, options));
    }

    fn queue_channel(&self, link: Link, local: Arc<MockDataChannel>, remote: Arc<MockDataChannel>) {
        let mut state = self.state.lock().unwrap();
        state.channels.push((link.clone(), Arc::clone(&local)));
        state
            .pending
            .entry(link)
            .or_default()
            .push((local, remote));
    }

    /// Opens queued channels once both directions of the link are connected.
    fn open_channels(&self, link: &Link) {
        let reverse = (link.1.clone(), link.0.clone());
        let (forward, backward, ready) = {
            let mut state = self.state.lock().unwrap();
            let (Some(a), Some(b)) = (
                state.connections.get(link).cloned(),
                state.connections.get(&reverse).cloned(),
            ) else {
                return;
            };
            if !(a.is_connected() && b.is_connected()) {
                return;
            }
            let mut ready = Vec::new();
            for (owner, pairs) in [
                (link.clone(), state.pending.remove(link)),
                (reverse.clone(), state.pending.remove(&reverse)),
            ] {
                for (local, remote) in pairs.unwrap_or_default() {
                    ready.push((owner.clone(), local, remote));
                }
            }
            for (owner, _, remote) in &ready {
                let remote_owner = (owner.1.clone(), owner.0.clone());
                state.channels.push((remote_owner, Arc::clone(remote)));
            }
            (a, b, ready)
        };

        for (owner, local, remote) in ready {
            let (creator, acceptor) = if owner == *link {
                (&forward, &backward)
            } else {
                (&backward, &forward)
            };
            remote.attach(acceptor.ctx.clone());
            remote.set_state(DataChannelState::Open);
            acceptor.ctx.emit(TransportEventKind::DataChannel(
                Arc::clone(&remote) as Arc<dyn DataChannel>
            ));
            acceptor.ctx.emit(TransportEventKind::ChannelState {
                label: remote.label.clone(),
                state: DataChannelState::Open,
            });

            local.set_state(DataChannelState::Open);
            creator.ctx.emit(TransportEventKind::ChannelState {
                label: local.label.clone(),
                state: DataChannelState::Open,
            });
        }
    }
}

pub struct MockConnectionFactory {
    network: MockNetwork,
}

#[async_trait]
impl PeerConnectionFactory for MockConnectionFactory {
    async fn create(&self, ctx: ConnectionContext) -> Result<Arc<dyn PeerConnection>> {
        let connection = Arc::new(MockPeerConnection {
            ctx,
            network: self.network.clone(),
            state: Mutex::new(ConnectionState::default()),
        });
        self.network.register(Arc::clone(&connection));
        Ok(connection)
    }
}

struct ConnectionState {
    signaling: SignalingState,
    ice: IceConnectionState,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidateInit>,
    closed: bool,
    hold_gathering: bool,
    gathering_held: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            signaling: SignalingState::Stable,
            ice: IceConnectionState::New,
            local: None,
            remote: None,
            remote_candidates: Vec::new(),
            closed: false,
            hold_gathering: false,
            gathering_held: false,
        }
    }
}

pub struct MockPeerConnection {
    ctx: ConnectionContext,
    network: MockNetwork,
    state: Mutex<ConnectionState>,
}

impl MockPeerConnection {
    fn link(&self) -> Link {
        (self.ctx.local_id.clone(), self.ctx.peer_id.clone())
    }

    pub fn generation(&self) -> u64 {
        self.ctx.generation
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().ice.is_connected()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidateInit> {
        self.state.lock().unwrap().remote_candidates.clone()
    }

    /// Further gathering rounds wait for `release_gathering`.
    pub fn hold_gathering(&self) {
        self.state.lock().unwrap().hold_gathering = true;
    }

    /// Runs a held gathering round, if any.
    pub fn release_gathering(&self) {
        let held = {
            let mut state = self.state.lock().unwrap();
            state.hold_gathering = false;
            std::mem::take(&mut state.gathering_held)
        };
        if held {
            self.gather();
        }
    }

    /// Reports an ICE state change as the native stack would.
    pub fn force_ice_state(&self, state: IceConnectionState) {
        self.state.lock().unwrap().ice = state;
        self.ctx.emit(TransportEventKind::IceConnectionState(state));
    }

    fn fake_sdp(&self, kind: &str) -> String {
        format!(
            "v=0\r\no=- {} {} IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=x-{}:{}\r\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\n",
            self.ctx.generation,
            self.ctx.generation + 1,
            kind,
            self.ctx.local_id
        )
    }

    fn set_signaling(&self, state: SignalingState) {
        self.state.lock().unwrap().signaling = state;
        self.ctx.emit(TransportEventKind::SignalingState(state));
    }

    fn gather(&self) {
        self.ctx
            .emit(TransportEventKind::IceGatheringState(IceGatheringState::Gathering));
        self.ctx
            .emit(TransportEventKind::IceCandidate(Some(IceCandidateInit {
                candidate: format!(
                    "candidate:{} 1 udp 2122260223 192.168.1.{} 54321 typ host",
                    self.ctx.generation,
                    self.ctx.local_id.as_str().len()
                ),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            })));
        self.ctx.emit(TransportEventKind::IceCandidate(None));
        self.ctx
            .emit(TransportEventKind::IceGatheringState(IceGatheringState::Complete));
    }

    fn try_connect(&self) {
        if self.network.manual_ice() {
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            let negotiated = state.local.is_some()
                && state.remote.is_some()
                && state.signaling == SignalingState::Stable;
            if !negotiated || state.closed || state.ice.is_connected() {
                return;
            }
            state.ice = IceConnectionState::Connected;
        }
        self.ctx.emit(TransportEventKind::IceConnectionState(
            IceConnectionState::Checking,
        ));
        self.ctx.emit(TransportEventKind::IceConnectionState(
            IceConnectionState::Connected,
        ));
        self.network.open_channels(&self.link());
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        self.network.record_offer(self.link(), options);
        Ok(SessionDescription::offer(self.fake_sdp("offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        if self.state.lock().unwrap().signaling != SignalingState::HaveRemoteOffer {
            return Err(Error::Native("no remote offer to answer".to_string()));
        }
        if self.network.take_answer_failure() {
            return Err(Error::Native("answer creation failed".to_string()));
        }
        Ok(SessionDescription::answer(self.fake_sdp("answer")))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let (next, held) = {
            let mut state = self.state.lock().unwrap();
            let next = match (desc.kind, state.signaling) {
                (SdpType::Offer, SignalingState::Stable) => SignalingState::HaveLocalOffer,
                (SdpType::Answer, SignalingState::HaveRemoteOffer) => SignalingState::Stable,
                (kind, current) => {
                    return Err(Error::Native(format!(
                        "cannot set local {kind:?} in {current:?}"
                    )));
                }
            };
            state.local = Some(desc);
            state.gathering_held = state.hold_gathering;
            (next, state.gathering_held)
        };
        self.set_signaling(next);
        if !held {
            self.gather();
        }
        self.try_connect();
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let next = {
            let mut state = self.state.lock().unwrap();
            let next = match (desc.kind, state.signaling) {
                (SdpType::Offer, SignalingState::Stable) => SignalingState::HaveRemoteOffer,
                (SdpType::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
                (kind, current) => {
                    return Err(Error::Native(format!(
                        "cannot set remote {kind:?} in {current:?}"
                    )));
                }
            };
            state.remote = Some(desc);
            next
        };
        self.set_signaling(next);
        self.try_connect();
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().unwrap().local.clone()
    }

    async fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().unwrap().remote.clone()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        self.state.lock().unwrap().remote_candidates.push(candidate);
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let (local, remote) = MockDataChannel::pair(label);
        local.attach(self.ctx.clone());
        self.network
            .queue_channel(self.link(), Arc::clone(&local), remote);
        self.network.open_channels(&self.link());
        Ok(local)
    }

    async fn add_local_stream(&self, _stream: &LocalStream) -> Result<()> {
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.state.lock().unwrap().signaling
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        self.state.lock().unwrap().ice
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.ice = IceConnectionState::Closed;
        state.signaling = SignalingState::Closed;
        Ok(())
    }
}

/// One end of a loopback data channel.
pub struct MockDataChannel {
    label: String,
    state: Mutex<DataChannelState>,
    owner: Mutex<Option<ConnectionContext>>,
    partner: Mutex<Weak<MockDataChannel>>,
    sent: Mutex<Vec<ChannelPayload>>,
}

impl MockDataChannel {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(DataChannelState::Connecting),
            owner: Mutex::new(None),
            partner: Mutex::new(Weak::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn pair(label: &str) -> (Arc<Self>, Arc<Self>) {
        let local = Arc::new(Self::new(label));
        let remote = Arc::new(Self::new(label));
        *local.partner.lock().unwrap() = Arc::downgrade(&remote);
        *remote.partner.lock().unwrap() = Arc::downgrade(&local);
        (local, remote)
    }

    fn attach(&self, ctx: ConnectionContext) {
        *self.owner.lock().unwrap() = Some(ctx);
    }

    fn set_state(&self, state: DataChannelState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn sent(&self) -> Vec<ChannelPayload> {
        self.sent.lock().unwrap().clone()
    }

    fn deliver(&self, payload: ChannelPayload) -> Result<()> {
        if *self.state.lock().unwrap() != DataChannelState::Open {
            return Err(Error::Native(format!("channel '{}' is not open", self.label)));
        }
        self.sent.lock().unwrap().push(payload.clone());

        let partner = self.partner.lock().unwrap().upgrade();
        if let Some(partner) = partner {
            if let Some(ctx) = partner.owner.lock().unwrap().clone() {
                ctx.emit(TransportEventKind::ChannelMessage {
                    label: self.label.clone(),
                    payload,
                });
            }
        }
        Ok(())
    }

    fn receive(&self, payload: ChannelPayload) {
        if let Some(ctx) = self.owner.lock().unwrap().clone() {
            ctx.emit(TransportEventKind::ChannelMessage {
                label: self.label.clone(),
                payload,
            });
        }
    }

    fn close_end(&self) {
        let was_open = {
            let mut state = self.state.lock().unwrap();
            let was_open = *state != DataChannelState::Closed;
            *state = DataChannelState::Closed;
            was_open
        };
        if !was_open {
            return;
        }
        if let Some(ctx) = self.owner.lock().unwrap().clone() {
            ctx.emit(TransportEventKind::ChannelState {
                label: self.label.clone(),
                state: DataChannelState::Closed,
            });
        }
    }
}

#[async_trait]
impl DataChannel for MockDataChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn ready_state(&self) -> DataChannelState {
        *self.state.lock().unwrap()
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.deliver(ChannelPayload::Text(text))
    }

    async fn send_binary(&self, data: Bytes) -> Result<()> {
        self.deliver(ChannelPayload::Binary(data))
    }

    async fn close(&self) -> Result<()> {
        self.close_end();
        let partner = self.partner.lock().unwrap().upgrade();
        if let Some(partner) = partner {
            partner.close_end();
        }
        Ok(())
    }
}
