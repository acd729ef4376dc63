use roomlink_client::{HandshakeStep, RoomEvent};
use roomlink_core::RoomOptions;
use std::time::Duration;

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_trickle_relays_candidates_separately() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);

    connect_pair(&mut a, &mut b).await;

    assert!(hub.count_sent(&a.id, "candidate") >= 1);
    assert!(hub.count_sent(&b.id, "candidate") >= 1);
    let b_to_a = network.connection("B", "A").expect("B connection");
    assert!(!b_to_a.remote_candidates().is_empty());
}

#[tokio::test]
async fn test_non_trickle_peer_waits_for_complete_description() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let no_trickle = RoomOptions {
        enable_ice_trickle: false,
        ..test_options()
    };
    let mut a = TestPeer::new("A", 100.0, no_trickle, &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);

    connect_pair(&mut a, &mut b).await;

    // B honours the trickle setting A announced in `enter`.
    assert_eq!(hub.count_sent(&a.id, "candidate"), 0);
    assert_eq!(hub.count_sent(&b.id, "candidate"), 0);
    assert_eq!(hub.count_sent(&a.id, "offer"), 1);
    assert_eq!(hub.count_sent(&b.id, "answer"), 1);
}

#[tokio::test]
async fn test_ice_restart_offer_waits_for_new_gathering_round() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let no_trickle = || RoomOptions {
        enable_ice_trickle: false,
        ..test_options()
    };
    let mut a = TestPeer::new("A", 100.0, no_trickle(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, no_trickle(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    let a_to_b = network.connection("A", "B").expect("A connection");
    a_to_b.hold_gathering();
    b.room.restart_peer(&a.id, false).await.expect("restart");

    a.wait_for(|e| {
        matches!(
            e,
            RoomEvent::HandshakeProgress {
                step: HandshakeStep::Offer,
                ..
            }
        )
    })
    .await
    .expect("restart offer applied");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let offers = network.offers("A", "B");
    assert_eq!(offers.len(), 2);
    assert!(offers[1].ice_restart);
    assert_eq!(hub.count_sent(&a.id, "offer"), 1);

    a_to_b.release_gathering();
    b.wait_for(|e| {
        matches!(
            e,
            RoomEvent::HandshakeProgress {
                step: HandshakeStep::Answer,
                ..
            }
        )
    })
    .await
    .expect("answer to the restart offer");

    assert_eq!(hub.count_sent(&a.id, "offer"), 2);
    assert_eq!(hub.count_sent(&a.id, "candidate"), 0);
}
