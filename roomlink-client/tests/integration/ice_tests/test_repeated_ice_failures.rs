use roomlink_client::{HandshakeStep, RoomEvent};
use roomlink_core::{IceConnectionState, PeerId, SignalMessage};
use std::time::Duration;

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

async fn fail_ice(network: &MockNetwork, a: &mut TestPeer) -> bool {
    network
        .connection("A", "B")
        .expect("A connection")
        .force_ice_state(IceConnectionState::Failed);
    let restart = a
        .wait_for(|e| matches!(e, RoomEvent::PeerRestart { .. }))
        .await
        .expect("restart after ICE failure");
    let RoomEvent::PeerRestart {
        hard,
        is_self_initiated,
        ..
    } = restart
    else {
        unreachable!();
    };
    assert!(is_self_initiated);
    hard
}

#[tokio::test]
async fn test_third_ice_failure_disables_trickle_and_restarts_hard() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;
    network.set_manual_ice(true);

    assert!(!fail_ice(&network, &mut a).await);
    assert!(!fail_ice(&network, &mut a).await);
    assert_eq!(network.connections_created("A", "B"), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let candidates_before = hub.count_sent(&a.id, "candidate");
    assert!(fail_ice(&network, &mut a).await);

    // The replacement offer goes out with candidates embedded.
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
    .expect("new offer");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(network.connections_created("A", "B"), 2);
    assert_eq!(hub.count_sent(&a.id, "candidate"), candidates_before);
    let sent = hub.sent_by(&PeerId::from("A"));
    assert!(sent.iter().any(|m| matches!(
        m,
        SignalMessage::Restart {
            hard_restart: true,
            ..
        }
    )));

    // Trickle is off now, so a further failure stays soft.
    a.drain();
    assert!(!fail_ice(&network, &mut a).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(network.connections_created("A", "B"), 2);
}

#[tokio::test]
async fn test_soft_restart_offers_with_ice_restart() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    assert!(!fail_ice(&network, &mut a).await);
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
    .expect("restart offer");

    let offers = network.offers("A", "B");
    assert_eq!(offers.len(), 2);
    assert!(!offers[0].ice_restart);
    assert!(offers[1].ice_restart);
    assert_eq!(network.connections_created("A", "B"), 1);
}
