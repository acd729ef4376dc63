use roomlink_core::PeerId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer expiry, delivered to the room loop like any other input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Health {
        peer_id: PeerId,
        token: u64,
    },
    TransferTimeout {
        peer_id: PeerId,
        channel: String,
        token: u64,
    },
}

/// A pending timer. Dropping the handle cancels it.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn arm(
    after: Duration,
    tx: &mpsc::UnboundedSender<TimerEvent>,
    event: TimerEvent,
) -> TimerHandle {
    let tx = tx.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(event);
    });
    TimerHandle { task }
}
