use roomlink_client::RoomEvent;
use serde_json::json;

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_private_message_over_data_channel() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    a.room
        .send_p2p_message(Some(&b.id), json!({"text": "hi"}))
        .await
        .expect("send");

    let received = b
        .wait_for(|e| matches!(e, RoomEvent::IncomingMessage { .. }))
        .await
        .expect("message");
    assert_eq!(
        received,
        RoomEvent::IncomingMessage {
            peer_id: a.id.clone(),
            data: json!({"text": "hi"}),
            is_private: true,
            is_data_channel: true,
        }
    );
}

#[tokio::test]
async fn test_broadcast_reaches_every_peer() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    b.room
        .send_p2p_message(None, json!("hello all"))
        .await
        .expect("broadcast");

    let received = a
        .wait_for(|e| matches!(e, RoomEvent::IncomingMessage { .. }))
        .await
        .expect("message");
    let RoomEvent::IncomingMessage {
        peer_id,
        is_private,
        is_data_channel,
        ..
    } = received
    else {
        unreachable!();
    };
    assert_eq!(peer_id, b.id);
    assert!(!is_private);
    assert!(is_data_channel);
}
