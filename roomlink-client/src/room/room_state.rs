use roomlink_core::{CandidateFilter, IceServerConfig, PeerId, ReadyState};
use serde_json::Value;

/// Room-level facts fixed by `inRoom`, plus the flags that change later.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub rid: String,
    pub self_id: Option<PeerId>,
    pub ice_servers: Vec<IceServerConfig>,
    pub tie_breaker: f64,
    pub locked: bool,
    pub has_mcu: bool,
    pub user_data: Value,
    pub ready_state: ReadyState,
}

impl RoomState {
    pub fn new(rid: String, user_data: Value) -> Self {
        Self {
            rid,
            self_id: None,
            ice_servers: Vec::new(),
            tie_breaker: 0.0,
            locked: false,
            has_mcu: false,
            user_data,
            ready_state: ReadyState::Init,
        }
    }

    pub fn in_room(&self) -> bool {
        self.ready_state == ReadyState::InRoom
    }
}

/// Drops TURN urls when relay candidates are not allowed.
pub fn filter_ice_servers(
    servers: Vec<IceServerConfig>,
    filter: &CandidateFilter,
) -> Vec<IceServerConfig> {
    if filter.relay {
        return servers;
    }
    servers
        .iter()
        .filter_map(IceServerConfig::without_relay)
        .collect()
}
