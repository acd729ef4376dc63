use roomlink_client::{RoomDeps, RoomEvent, RoomSession, StaticBootstrap};
use roomlink_core::{PeerId, ReadyState, RoomCredentials, RoomOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::Level;

use crate::utils::{MockNetwork, MockSignalingHub};

pub const ROOM_KEY: &str = "room-key";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn test_options() -> RoomOptions {
    RoomOptions {
        signaling_url: Some("ws://signaling.test".to_string()),
        ..RoomOptions::new("app-key", "lobby")
    }
}

pub fn credentials() -> RoomCredentials {
    RoomCredentials {
        room_key: ROOM_KEY.to_string(),
        uid: "user".to_string(),
        cid: "client".to_string(),
        len: 2,
        auto_introduce: true,
        ..Default::default()
    }
}

/// A room session wired to the mock hub and network, plus its event stream.
pub struct TestPeer {
    pub id: PeerId,
    pub room: RoomSession,
    pub events: broadcast::Receiver<RoomEvent>,
}

impl TestPeer {
    pub fn new(
        sid: &str,
        tie_breaker: f64,
        options: RoomOptions,
        hub: &MockSignalingHub,
        network: &MockNetwork,
    ) -> Self {
        let deps = RoomDeps::new(
            Arc::new(StaticBootstrap::new(credentials())),
            hub.gateway(sid, Some(tie_breaker)),
            network.factory(),
        );
        let room = RoomSession::from_options(options, deps).expect("valid options");
        let events = room.subscribe();
        Self {
            id: PeerId::from(sid),
            room,
            events,
        }
    }

    /// Connects and waits for `inRoom`.
    pub async fn join(&mut self) {
        self.room.connect().await.expect("connect");
        wait_for_event(&mut self.events, |e| {
            matches!(e, RoomEvent::ReadyStateChange(ReadyState::InRoom))
        })
        .await
        .expect("inRoom");
    }

    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<RoomEvent>
    where
        F: FnMut(&RoomEvent) -> bool,
    {
        wait_for_event(&mut self.events, predicate).await
    }

    pub async fn wait_connected_to(&mut self, peer: &PeerId) {
        let peer = peer.clone();
        self.wait_for(|e| {
            matches!(
                e,
                RoomEvent::IceConnectionState { peer_id, state }
                    if *peer_id == peer && state.is_connected()
            )
        })
        .await
        .expect("ice connected");
    }

    /// Every event received so far without waiting.
    pub fn drain(&mut self) -> Vec<RoomEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Joins `a` first, then `b`, and waits until both see each other connected.
pub async fn connect_pair(a: &mut TestPeer, b: &mut TestPeer) {
    a.join().await;
    b.join().await;
    let (a_id, b_id) = (a.id.clone(), b.id.clone());
    a.wait_connected_to(&b_id).await;
    b.wait_connected_to(&a_id).await;
}

pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<RoomEvent>,
    mut predicate: F,
) -> Option<RoomEvent>
where
    F: FnMut(&RoomEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .ok()
        .flatten()
}
