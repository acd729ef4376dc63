use serde::{Deserialize, Serialize};

/// Credentials handed out by the bootstrap request and replayed in `joinRoom`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCredentials {
    /// Room key used as `rid` on every signaling message.
    pub room_key: String,
    pub uid: String,
    pub cid: String,
    pub user_cred: String,
    pub time_stamp: String,
    pub room_cred: String,
    pub start: String,
    pub len: u64,
    pub is_privileged: bool,
    pub auto_introduce: bool,
    /// Signaling endpoint handed out by the API server, if any.
    #[serde(default)]
    pub signaling_url: Option<String>,
}
