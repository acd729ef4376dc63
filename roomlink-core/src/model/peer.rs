use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved id of the media relay peer.
pub const MCU_PEER_ID: &str = "MCU";

/// Opaque session id assigned by the signaling server.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn mcu() -> Self {
        Self(MCU_PEER_ID.to_string())
    }

    pub fn is_mcu(&self) -> bool {
        self.0 == MCU_PEER_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
