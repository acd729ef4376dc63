//! Room configuration.
//!
//! `RoomOptions` is the raw, fully defaulted form read from JSON or built in
//! code. `RoomOptions::validate` checks every field in one pass and produces
//! the immutable `RoomConfig` the rest of the library is handed.

use crate::error::{ConfigError, FieldError};
use crate::model::{AgentInfo, CandidateType, ConnectionSettings, IceServerConfig};
use crate::utils::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomOptions {
    pub app_key: String,
    pub room: String,
    /// Base url of the bootstrap API (`http://` or `https://`).
    pub api_server: Option<String>,
    /// Signaling endpoint; overrides the one returned by the bootstrap.
    pub signaling_url: Option<String>,
    pub user_data: Value,
    pub agent: AgentInfo,
    pub audio: bool,
    pub video: bool,
    pub receive_only: bool,
    pub enable_data_channel: bool,
    pub enable_ice_trickle: bool,
    pub enable_stereo: bool,
    pub bandwidth: Bandwidth,
    pub preferred_audio_codec: Option<String>,
    pub preferred_video_codec: Option<String>,
    pub candidate_filter: CandidateFilter,
    /// Used when `inRoom` carries no ICE servers.
    pub ice_servers: Vec<IceServerConfig>,
    /// Agent families that always take the answerer role.
    pub answerer_agents: Vec<String>,
    pub bootstrap_attempts: u32,
    pub health: HealthSettings,
    pub transfer: TransferSettings,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            room: String::new(),
            api_server: None,
            signaling_url: None,
            user_data: Value::Null,
            agent: AgentInfo::default(),
            audio: false,
            video: false,
            receive_only: false,
            enable_data_channel: true,
            enable_ice_trickle: true,
            enable_stereo: false,
            bandwidth: Bandwidth::default(),
            preferred_audio_codec: None,
            preferred_video_codec: None,
            candidate_filter: CandidateFilter::default(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_string(), DEFAULT_STUN_ADDR_2.to_string()],
                username: None,
                credential: None,
            }],
            answerer_agents: vec!["firefox".to_string()],
            bootstrap_attempts: DEFAULT_BOOTSTRAP_ATTEMPTS,
            health: HealthSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

/// Per-media bandwidth caps in kbps, written into the SDP as `b=AS:`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bandwidth {
    pub audio: Option<u32>,
    pub video: Option<u32>,
    pub data: Option<u32>,
}

/// Allow-list of ICE candidate types, applied in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateFilter {
    pub host: bool,
    pub srflx: bool,
    pub relay: bool,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            host: true,
            srflx: true,
            relay: true,
        }
    }
}

impl CandidateFilter {
    pub fn allows(&self, kind: CandidateType) -> bool {
        match kind {
            CandidateType::Host => self.host,
            CandidateType::Srflx | CandidateType::Prflx => self.srflx,
            CandidateType::Relay => self.relay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthSettings {
    pub answerer_timeout_ms: u64,
    pub offerer_timeout_ms: u64,
    pub no_trickle_extra_ms: u64,
    pub mcu_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            answerer_timeout_ms: ANSWERER_TIMEOUT_MS,
            offerer_timeout_ms: OFFERER_TIMEOUT_MS,
            no_trickle_extra_ms: NO_TRICKLE_EXTRA_MS,
            mcu_timeout_ms: MCU_TIMEOUT_MS,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            max_retries: MAX_HEALTH_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferSettings {
    pub blob_chunk_size: usize,
    pub constrained_blob_chunk_size: usize,
    pub data_url_chunk_size: usize,
    /// Agent families that get the smaller blob chunk size.
    pub constrained_agents: Vec<String>,
    pub default_timeout_secs: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            blob_chunk_size: CHUNK_FILE_SIZE,
            constrained_blob_chunk_size: CHUNK_FILE_SIZE_CONSTRAINED,
            data_url_chunk_size: CHUNK_DATAURL_SIZE,
            constrained_agents: vec!["firefox".to_string()],
            default_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
        }
    }
}

impl TransferSettings {
    /// Blob chunk size for a transfer between the two agents.
    pub fn blob_chunk_size_for(&self, local: &AgentInfo, remote: &AgentInfo) -> usize {
        if local.is_family_of(&self.constrained_agents)
            || remote.is_family_of(&self.constrained_agents)
        {
            self.constrained_blob_chunk_size
        } else {
            self.blob_chunk_size
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl RoomOptions {
    pub fn new(app_key: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            room: room.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(self) -> Result<RoomConfig, ConfigError> {
        let mut fields = Vec::new();

        if self.app_key.trim().is_empty() {
            fields.push(FieldError::new("appKey", "must not be empty"));
        }
        if self.room.trim().is_empty() {
            fields.push(FieldError::new("room", "must not be empty"));
        } else if self.room.chars().any(char::is_whitespace) {
            fields.push(FieldError::new("room", "must not contain whitespace"));
        }
        if let Some(url) = &self.api_server {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                fields.push(FieldError::new("apiServer", "must be an http(s) url"));
            }
        }
        if let Some(url) = &self.signaling_url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                fields.push(FieldError::new("signalingUrl", "must be a ws(s) url"));
            }
        }
        if self.agent.name.trim().is_empty() {
            fields.push(FieldError::new("agent.name", "must not be empty"));
        }
        if !(self.candidate_filter.host
            || self.candidate_filter.srflx
            || self.candidate_filter.relay)
        {
            fields.push(FieldError::new(
                "candidateFilter",
                "at least one candidate type must be allowed",
            ));
        }
        for (field, value) in [
            ("bandwidth.audio", self.bandwidth.audio),
            ("bandwidth.video", self.bandwidth.video),
            ("bandwidth.data", self.bandwidth.data),
        ] {
            if value == Some(0) {
                fields.push(FieldError::new(field, "must be greater than zero"));
            }
        }
        if self.bootstrap_attempts == 0 {
            fields.push(FieldError::new("bootstrapAttempts", "must be at least 1"));
        }
        if self.health.answerer_timeout_ms == 0 || self.health.offerer_timeout_ms == 0 {
            fields.push(FieldError::new("health", "base timeouts must be positive"));
        }
        if self.transfer.blob_chunk_size == 0 || self.transfer.constrained_blob_chunk_size == 0 {
            fields.push(FieldError::new("transfer.blobChunkSize", "must be at least 1"));
        }
        if self.transfer.data_url_chunk_size == 0 {
            fields.push(FieldError::new("transfer.dataUrlChunkSize", "must be at least 1"));
        }
        if self.transfer.default_timeout_secs == 0 {
            fields.push(FieldError::new(
                "transfer.defaultTimeoutSecs",
                "must be greater than zero",
            ));
        }

        if fields.is_empty() {
            Ok(RoomConfig { options: self })
        } else {
            Err(ConfigError { fields })
        }
    }
}

/// Validated, immutable room configuration.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    options: RoomOptions,
}

impl RoomConfig {
    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    pub fn wants_media(&self) -> bool {
        !self.options.receive_only && (self.options.audio || self.options.video)
    }

    /// Capabilities announced to other participants.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            stereo: self.options.enable_stereo,
            recv_only: self.options.receive_only,
            data_channel: self.options.enable_data_channel,
            trickle_ice: self.options.enable_ice_trickle,
        }
    }
}

impl Deref for RoomConfig {
    type Target = RoomOptions;

    fn deref(&self) -> &Self::Target {
        &self.options
    }
}
