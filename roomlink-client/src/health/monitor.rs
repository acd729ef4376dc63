use crate::timer::{self, TimerEvent, TimerHandle};
use roomlink_core::{HealthSettings, IceConnectionState, PeerId, SignalingState};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Deadline for a peer to become stable after a handshake starts.
pub fn compute_timeout(
    is_offerer: bool,
    trickle: bool,
    has_mcu: bool,
    retries: u32,
    settings: &HealthSettings,
) -> Duration {
    let mut ms = if has_mcu {
        settings.mcu_timeout_ms
    } else if is_offerer {
        settings.offerer_timeout_ms
    } else {
        settings.answerer_timeout_ms
    };
    if !trickle {
        ms += settings.no_trickle_extra_ms;
    }
    ms += settings.retry_backoff_ms * u64::from(retries.min(settings.max_retries));
    Duration::from_millis(ms)
}

/// What the monitor inspects when a peer's timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySnapshot {
    pub signaling: SignalingState,
    pub has_local: bool,
    pub has_remote: bool,
    pub ice: IceConnectionState,
    /// `None` when no persistent data channel is required.
    pub main_open: Option<bool>,
}

impl StabilitySnapshot {
    pub fn is_stable(&self) -> bool {
        self.signaling == SignalingState::Stable
            && self.has_local
            && self.has_remote
            && self.ice.is_connected()
            && self.main_open.unwrap_or(true)
    }
}

#[derive(Debug)]
struct HealthEntry {
    timer: Option<TimerHandle>,
    token: u64,
    healthy: bool,
}

/// Per-peer watchdog timers.
#[derive(Debug)]
pub struct HealthMonitor {
    entries: HashMap<PeerId, HealthEntry>,
    next_token: u64,
    timers: mpsc::UnboundedSender<TimerEvent>,
}

impl HealthMonitor {
    pub fn new(timers: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            entries: HashMap::new(),
            next_token: 0,
            timers,
        }
    }

    /// (Re)arms the watchdog of a peer; a running timer is replaced.
    pub fn start(&mut self, peer_id: &PeerId, timeout: Duration) {
        self.next_token += 1;
        let token = self.next_token;
        debug!("Health check for {} in {:?}", peer_id, timeout);
        let timer = timer::arm(
            timeout,
            &self.timers,
            TimerEvent::Health {
                peer_id: peer_id.clone(),
                token,
            },
        );
        self.entries.insert(
            peer_id.clone(),
            HealthEntry {
                timer: Some(timer),
                token,
                healthy: false,
            },
        );
    }

    /// Whether an expiry belongs to the peer's latest timer.
    pub fn is_current(&self, peer_id: &PeerId, token: u64) -> bool {
        self.entries
            .get(peer_id)
            .is_some_and(|entry| entry.token == token && entry.timer.is_some())
    }

    pub fn mark_healthy(&mut self, peer_id: &PeerId) {
        if let Some(entry) = self.entries.get_mut(peer_id) {
            entry.timer = None;
            entry.healthy = true;
        }
    }

    pub fn is_healthy(&self, peer_id: &PeerId) -> Option<bool> {
        self.entries.get(peer_id).map(|entry| entry.healthy)
    }

    pub fn clear(&mut self, peer_id: &PeerId) {
        self.entries.remove(peer_id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}
