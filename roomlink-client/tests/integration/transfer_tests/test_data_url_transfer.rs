use roomlink_client::{RoomEvent, TransferData, TransferRequest};
use roomlink_core::{DataTransferState, MAIN_CHANNEL};

use crate::utils::{
    MockNetwork, MockSignalingHub, TestPeer, connect_pair, init_tracing, test_options,
};

#[tokio::test]
async fn test_data_url_transfer_on_transient_channel() {
    init_tracing();

    let hub = MockSignalingHub::new();
    let network = MockNetwork::new();
    let mut a = TestPeer::new("A", 100.0, test_options(), &hub, &network);
    let mut b = TestPeer::new("B", 50.0, test_options(), &hub, &network);
    connect_pair(&mut a, &mut b).await;

    let url = format!("data:text/plain;base64,{}", "QUJD".repeat(700));
    let request = TransferRequest::new("note.txt", TransferData::DataUrl(url.clone()));
    let transfer_id = a.room.transfer(&b.id, request).await.expect("transfer starts");

    b.wait_for(|e| {
        matches!(
            e,
            RoomEvent::DataTransferState {
                state: DataTransferState::UploadRequest,
                ..
            }
        )
    })
    .await
    .expect("upload request");
    b.room
        .respond_transfer(&a.id, &transfer_id, true)
        .await
        .expect("accept");

    let completed = b
        .wait_for(|e| {
            matches!(
                e,
                RoomEvent::DataTransferState {
                    state: DataTransferState::DownloadCompleted,
                    ..
                }
            )
        })
        .await
        .expect("download completed");
    let RoomEvent::DataTransferState { data, .. } = completed else {
        unreachable!();
    };
    assert_eq!(data, Some(TransferData::DataUrl(url)));

    // Nothing went over the persistent channel.
    assert!(network.envelopes_sent("A", "B", MAIN_CHANNEL).is_empty());
}
