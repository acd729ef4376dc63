use roomlink_client::RoomEvent;
use roomlink_core::{PeerId, ReadyState, SignalEnvelope, SignalMessage};
use serde_json::json;

use crate::utils::{
    MockNetwork, MockSignalingHub, ROOM_KEY, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_public_and_private_signaling_messages() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    a.room.send_message(None, json!({"hello": "room"})).await.expect("public");
    let public = b
        .wait_for(|e| matches!(e, RoomEvent::IncomingMessage { .. }))
        .await
        .expect("public message");
    assert_eq!(
        public,
        RoomEvent::IncomingMessage {
            peer_id: a.id.clone(),
            data: json!({"hello": "room"}),
            is_private: false,
            is_data_channel: false,
        }
    );

    a.room
        .send_message(Some(&b.id), json!("psst"))
        .await
        .expect("private");
    let private = b
        .wait_for(|e| matches!(e, RoomEvent::IncomingMessage { .. }))
        .await
        .expect("private message");
    assert!(matches!(
        private,
        RoomEvent::IncomingMessage {
            is_private: true,
            is_data_channel: false,
            ..
        }
    ));
}

#[tokio::test]
async fn test_room_lock_and_user_data_are_broadcast() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    a.room.lock_room(true).await.expect("lock");
    let lock = b
        .wait_for(|e| matches!(e, RoomEvent::RoomLock { .. }))
        .await
        .expect("lock event");
    assert_eq!(
        lock,
        RoomEvent::RoomLock {
            peer_id: a.id.clone(),
            locked: true,
        }
    );

    a.room
        .set_user_data(json!({"name": "alice"}))
        .await
        .expect("user data");
    b.wait_for(|e| matches!(e, RoomEvent::PeerUpdated { .. }))
        .await
        .expect("update event");
    let info = b.room.peer(&a.id).expect("A is known");
    assert_eq!(info.user.data, json!({"name": "alice"}));
}

#[tokio::test]
async fn test_rejecting_redirect_stops_the_room() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    a.join().await;

    hub.inject(
        &PeerId::from("A"),
        SignalEnvelope::new(
            Some(ROOM_KEY.to_string()),
            SignalMessage::Redirect {
                action: "reject".to_string(),
                info: "room is locked".to_string(),
                reason: "locked".to_string(),
            },
        ),
    );

    let redirect = a
        .wait_for(|e| matches!(e, RoomEvent::Redirect { .. }))
        .await
        .expect("redirect");
    assert!(matches!(redirect, RoomEvent::Redirect { ref action, .. } if action == "reject"));
    let state = a
        .wait_for(|e| matches!(e, RoomEvent::ReadyStateChange(ReadyState::Error(_))))
        .await
        .expect("error state");
    assert_eq!(
        state,
        RoomEvent::ReadyStateChange(ReadyState::Error("room is locked".to_string()))
    );
}
