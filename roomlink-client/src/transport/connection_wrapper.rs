use crate::transport::data_channel_wrapper::WebRtcDataChannel;
use crate::transport::media::{LocalStream, TrackKind};
use crate::transport::peer_connection::{
    ConnectionContext, DataChannel, OfferOptions, PeerConnection, PeerConnectionFactory,
};
use crate::transport::transport_event::TransportEventKind;
use anyhow::Context;
use async_trait::async_trait;
use roomlink_core::{
    Error, IceCandidateInit, IceConnectionState, IceGatheringState, IceServerConfig, PeerId,
    Result, SdpType, SessionDescription, SignalingState,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Builds `webrtc` crate peer connections sharing one media engine.
pub struct WebRtcConnectionFactory {
    api: API,
}

impl WebRtcConnectionFactory {
    pub fn new() -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api })
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcConnectionFactory {
    async fn create(&self, ctx: ConnectionContext) -> Result<Arc<dyn PeerConnection>> {
        let wrapper = ConnectionWrapper::new(&self.api, ctx)
            .await
            .map_err(native)?;
        Ok(Arc::new(wrapper))
    }
}

/// One native connection with its callbacks routed into the room loop.
pub struct ConnectionWrapper {
    pub peer_id: PeerId,
    pub peer_connection: Arc<RTCPeerConnection>,
    ctx: ConnectionContext,
    local_tracks: Mutex<Vec<Arc<TrackLocalStaticSample>>>,
}

impl ConnectionWrapper {
    pub async fn new(api: &API, ctx: ConnectionContext) -> anyhow::Result<Self> {
        let rtc_config = RTCConfiguration {
            ice_servers: ctx.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("failed to create peer connection")?,
        );

        let ctx_ice = ctx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let ctx = ctx_ice.clone();
            Box::pin(async move {
                let candidate = match c {
                    Some(candidate) => match candidate.to_json() {
                        Ok(json) => Some(from_rtc_candidate(json)),
                        Err(_) => return,
                    },
                    None => None,
                };
                ctx.emit(TransportEventKind::IceCandidate(candidate));
            })
        }));

        let ctx_state = ctx.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let ctx = ctx_state.clone();
                Box::pin(async move {
                    info!("ICE connection state for {}: {}", ctx.peer_id, s);
                    ctx.emit(TransportEventKind::IceConnectionState(convert_ice_state(s)));
                })
            },
        ));

        let ctx_gather = ctx.clone();
        peer_connection.on_ice_gathering_state_change(Box::new(
            move |s: RTCIceGathererState| {
                let ctx = ctx_gather.clone();
                Box::pin(async move {
                    let state = match s {
                        RTCIceGathererState::Gathering => IceGatheringState::Gathering,
                        RTCIceGathererState::Complete => IceGatheringState::Complete,
                        _ => IceGatheringState::New,
                    };
                    ctx.emit(TransportEventKind::IceGatheringState(state));
                })
            },
        ));

        let ctx_sig = ctx.clone();
        peer_connection.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
            let ctx = ctx_sig.clone();
            Box::pin(async move {
                ctx.emit(TransportEventKind::SignalingState(convert_signaling_state(s)));
            })
        }));

        let ctx_dc = ctx.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let ctx = ctx_dc.clone();
            Box::pin(async move {
                debug!("remote data channel '{}' from {}", dc.label(), ctx.peer_id);
                let channel: Arc<dyn DataChannel> = WebRtcDataChannel::wire(dc, &ctx);
                ctx.emit(TransportEventKind::DataChannel(channel));
            })
        }));

        let ctx_track = ctx.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let ctx = ctx_track.clone();
            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Video => TrackKind::Video,
                    _ => TrackKind::Audio,
                };
                ctx.emit(TransportEventKind::RemoteTrack {
                    kind,
                    id: track.id(),
                });
            })
        }));

        Ok(Self {
            peer_id: ctx.peer_id.clone(),
            peer_connection,
            ctx,
            local_tracks: Mutex::new(Vec::new()),
        })
    }

    /// Tracks added through `add_local_stream`, for the caller to feed samples into.
    pub fn local_tracks(&self) -> Vec<Arc<TrackLocalStaticSample>> {
        self.local_tracks
            .lock()
            .map(|tracks| tracks.clone())
            .unwrap_or_default()
    }
}

fn native(err: anyhow::Error) -> Error {
    Error::Native(format!("{err:#}"))
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidateInit {
    IceCandidateInit {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_m_line_index: init.sdp_mline_index,
    }
}

fn to_rtc_description(desc: SessionDescription) -> anyhow::Result<RTCSessionDescription> {
    let converted = match desc.kind {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(converted)
}

fn from_rtc_description(desc: RTCSessionDescription) -> Option<SessionDescription> {
    match desc.sdp_type {
        RTCSdpType::Offer => Some(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer | RTCSdpType::Pranswer => Some(SessionDescription::answer(desc.sdp)),
        _ => None,
    }
}

fn convert_ice_state(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        _ => IceConnectionState::New,
    }
}

fn convert_signaling_state(state: RTCSignalingState) -> SignalingState {
    match state {
        RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveLocalPranswer => {
            SignalingState::HaveLocalOffer
        }
        RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveRemotePranswer => {
            SignalingState::HaveRemoteOffer
        }
        RTCSignalingState::Closed => SignalingState::Closed,
        _ => SignalingState::Stable,
    }
}

#[async_trait]
impl PeerConnection for ConnectionWrapper {
    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        let native_options = options.ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });
        let offer = self
            .peer_connection
            .create_offer(native_options)
            .await
            .context("failed to create offer")
            .map_err(native)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("failed to create answer")
            .map_err(native)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc).map_err(native)?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .context("failed to set local description")
            .map_err(native)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_description(desc).map_err(native)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("failed to set remote description")
            .map_err(native)
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.peer_connection
            .local_description()
            .await
            .and_then(from_rtc_description)
    }

    async fn remote_description(&self) -> Option<SessionDescription> {
        self.peer_connection
            .remote_description()
            .await
            .and_then(from_rtc_description)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("failed to add ICE candidate")
            .map_err(native)
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>> {
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let dc = self
            .peer_connection
            .create_data_channel(label, Some(init))
            .await
            .context("failed to create data channel")
            .map_err(native)?;
        Ok(WebRtcDataChannel::wire(dc, &self.ctx))
    }

    async fn add_local_stream(&self, stream: &LocalStream) -> Result<()> {
        for track in &stream.tracks {
            let mime_type = match track.kind {
                TrackKind::Audio => MIME_TYPE_OPUS,
                TrackKind::Video => MIME_TYPE_VP8,
            };
            let local = Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: mime_type.to_owned(),
                    ..Default::default()
                },
                track.id.clone(),
                stream.id.clone(),
            ));
            self.peer_connection
                .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .context("failed to add local track")
                .map_err(native)?;
            if let Ok(mut tracks) = self.local_tracks.lock() {
                tracks.push(local);
            }
        }
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        convert_signaling_state(self.peer_connection.signaling_state())
    }

    fn ice_connection_state(&self) -> IceConnectionState {
        convert_ice_state(self.peer_connection.ice_connection_state())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .context("failed to close peer connection")
            .map_err(native)
    }
}
