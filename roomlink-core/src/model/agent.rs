use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identification of the software running on the other end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub os: String,
}

impl AgentInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            os: std::env::consts::OS.to_string(),
        }
    }

    /// Case-insensitive membership test against a list of browser families.
    pub fn is_family_of(&self, families: &[String]) -> bool {
        families
            .iter()
            .any(|family| family.eq_ignore_ascii_case(&self.name))
    }
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self::new("roomlink", env!("CARGO_PKG_VERSION"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub agent: AgentInfo,
    #[serde(default)]
    pub data: Value,
}

/// Connection capabilities a participant announces in `enter` / `welcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    pub stereo: bool,
    pub recv_only: bool,
    pub data_channel: bool,
    #[serde(rename = "trickleICE")]
    pub trickle_ice: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            stereo: false,
            recv_only: false,
            data_channel: true,
            trickle_ice: true,
        }
    }
}

/// What the room knows about a remote participant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub user: UserInfo,
    pub connection: ConnectionSettings,
}
