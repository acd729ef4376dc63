use crate::model::peer::PeerId;
use crate::model::transfer::{TransferDataType, TransferId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label of the persistent messaging channel opened alongside every offer.
pub const MAIN_CHANNEL: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Messaging,
    Data,
}

impl ChannelKind {
    pub fn for_label(label: &str) -> Self {
        if label == MAIN_CHANNEL {
            Self::Messaging
        } else {
            Self::Data
        }
    }
}

/// JSON envelopes of the transfer protocol spoken over a data channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE", rename_all_fields = "camelCase")]
pub enum ChannelEnvelope {
    Message {
        sender: PeerId,
        #[serde(default)]
        target: Option<PeerId>,
        #[serde(default)]
        is_private: bool,
        data: Value,
    },
    Wrq {
        sender: PeerId,
        target: PeerId,
        agent: String,
        version: String,
        #[serde(default)]
        is_private: bool,
        id: TransferId,
        name: String,
        size: u64,
        data_type: TransferDataType,
        chunk_size: u64,
        /// Seconds.
        timeout: u64,
    },
    Ack {
        sender: PeerId,
        ack_n: i64,
        id: TransferId,
        #[serde(default)]
        name: String,
    },
    Cancel {
        sender: PeerId,
        id: TransferId,
        #[serde(default)]
        name: String,
        #[serde(default)]
        content: String,
    },
    Error {
        sender: PeerId,
        id: TransferId,
        #[serde(default)]
        name: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        is_upload_error: bool,
    },
}

impl ChannelEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a text frame; anything that is not a protocol envelope yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.trim_start().starts_with('{') {
            return None;
        }
        serde_json::from_str(text).ok()
    }
}
