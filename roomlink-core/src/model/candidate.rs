use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// Drops `turn:` / `turns:` urls, returning `None` when nothing is left.
    pub fn without_relay(&self) -> Option<Self> {
        let urls: Vec<String> = self
            .urls
            .iter()
            .filter(|url| !(url.starts_with("turn:") || url.starts_with("turns:")))
            .cloned()
            .collect();
        if urls.is_empty() {
            return None;
        }
        Some(Self {
            urls,
            username: self.username.clone(),
            credential: self.credential.clone(),
        })
    }
}

/// Candidate as exchanged over signaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidateInit {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }
    }

    pub fn candidate_type(&self) -> Option<CandidateType> {
        CandidateType::parse(&self.candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl CandidateType {
    /// Reads the `typ <type>` attribute of an `a=candidate` line.
    pub fn parse(candidate: &str) -> Option<Self> {
        let mut parts = candidate.split_whitespace();
        while let Some(part) = parts.next() {
            if part == "typ" {
                return match parts.next()? {
                    "host" => Some(Self::Host),
                    "srflx" => Some(Self::Srflx),
                    "prflx" => Some(Self::Prflx),
                    "relay" => Some(Self::Relay),
                    _ => None,
                };
            }
        }
        None
    }
}
