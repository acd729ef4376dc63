use roomlink_client::PeerConnection;
use roomlink_core::{AgentInfo, PeerId, RoomOptions, SignalingState};

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_larger_tie_breaker_sends_the_offer() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);

    connect_pair(&mut a, &mut b).await;

    assert_eq!(hub.count_sent(&a.id, "offer"), 1);
    assert_eq!(hub.count_sent(&b.id, "offer"), 0);
    assert_eq!(hub.count_sent(&b.id, "answer"), 1);
    assert_eq!(network.offers("A", "B").len(), 1);
    assert!(network.offers("B", "A").is_empty());

    let a_to_b = network.connection("A", "B").expect("A connection");
    let b_to_a = network.connection("B", "A").expect("B connection");
    assert_eq!(a_to_b.signaling_state(), SignalingState::Stable);
    assert_eq!(b_to_a.signaling_state(), SignalingState::Stable);

    assert!(a.room.peer(&PeerId::from("B")).is_some());
    assert_eq!(b.room.peers().len(), 1);
}

#[tokio::test]
async fn test_role_does_not_depend_on_join_order() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 50.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 100.0, test_options(), &hub, &network);

    connect_pair(&mut a, &mut b).await;

    assert_eq!(network.offers("B", "A").len(), 1);
    assert!(network.offers("A", "B").is_empty());
}

#[tokio::test]
async fn test_answer_only_agent_never_offers() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let firefox = RoomOptions {
        agent: AgentInfo::new("firefox", "128"),
        ..test_options()
    };
    let mut a = TestPeer::new("A", 100.0, firefox, &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);

    connect_pair(&mut a, &mut b).await;

    assert!(network.offers("A", "B").is_empty());
    assert_eq!(network.offers("B", "A").len(), 1);
}
