use roomlink_client::RoomEvent;
use roomlink_core::{Error, ReadyState};
use serde_json::json;

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_leaving_peer_is_removed_from_the_room() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;
    assert_eq!(a.room.peers().len(), 1);

    b.room.leave().await.expect("leave");
    assert_eq!(hub.count_sent(&b.id, "bye"), 1);

    let b_id = b.id.clone();
    a.wait_for(|e| matches!(e, RoomEvent::PeerLeft { peer_id } if *peer_id == b_id))
        .await
        .expect("peer left");
    assert!(a.room.peers().is_empty());
    assert!(network.connection("A", "B").expect("A connection").is_closed());

    b.wait_for(|e| matches!(e, RoomEvent::ReadyStateChange(ReadyState::Disconnected)))
        .await
        .expect("disconnected");
    let err = b.room.send_message(None, json!("late")).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));
}

#[tokio::test]
async fn test_signaling_loss_disconnects_the_room() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    hub.disconnect(&a.id, "server restart");

    a.wait_for(|e| matches!(e, RoomEvent::ReadyStateChange(ReadyState::Disconnected)))
        .await
        .expect("disconnected");
    assert!(a.room.peers().is_empty());
}
