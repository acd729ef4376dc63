use roomlink_core::{CandidateFilter, IceCandidateInit};

/// Remote candidates: queued until a remote description exists, then
/// sorted by whether the native layer accepted them.
#[derive(Debug, Clone, Default)]
pub struct IncomingCandidates {
    pub queue: Vec<IceCandidateInit>,
    pub success: Vec<IceCandidateInit>,
    pub failure: Vec<IceCandidateInit>,
}

/// Local candidates: `pending` until the local description goes out,
/// `gathered` keeps everything that passed the filter.
#[derive(Debug, Clone, Default)]
pub struct OutgoingCandidates {
    pub pending: Vec<IceCandidateInit>,
    pub gathered: Vec<IceCandidateInit>,
}

/// Candidates whose type cannot be read are let through.
pub fn is_allowed(filter: &CandidateFilter, candidate: &IceCandidateInit) -> bool {
    candidate
        .candidate_type()
        .is_none_or(|kind| filter.allows(kind))
}
