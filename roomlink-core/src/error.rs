use crate::model::{PeerId, TransferId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required collaborator is missing; fatal.
    #[error("Environment error: {0}")]
    Environment(String),

    /// Bootstrap request failure, retried up to the configured ceiling.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Signaling error: {0}")]
    Signaling(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Room is not connected")]
    NotConnected,

    /// Failure reported by the native WebRTC layer.
    #[error("Native WebRTC error: {0}")]
    Native(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Errors local to one data channel; they never tear down the peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("channel already carries transfer {0}")]
    Busy(TransferId),

    #[error("channel '{0}' is not open")]
    ChannelNotOpen(String),

    #[error("channel '{0}' does not exist")]
    ChannelNotFound(String),

    #[error("nothing to transfer")]
    EmptyData,

    #[error("no transfer is awaiting a response")]
    NoPendingRequest,

    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),

    #[error("failed to send on data channel: {0}")]
    Send(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Every field that failed validation, collected in one pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {}", describe(.fields))]
pub struct ConfigError {
    pub fields: Vec<FieldError>,
}

impl ConfigError {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
