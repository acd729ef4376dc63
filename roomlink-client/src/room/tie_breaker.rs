use roomlink_core::{AgentInfo, PeerId};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// One side of the offer/answer role decision.
#[derive(Debug, Clone, Copy)]
pub struct Contender<'a> {
    pub id: &'a PeerId,
    pub tie_breaker: f64,
    pub agent: &'a AgentInfo,
}

/// Decides whether `local` sends the offer to `remote`.
///
/// The MCU always offers. An agent from an answer-only family answers,
/// unless both sides are from one. Otherwise the larger tie-breaker
/// offers, and equal tie-breakers fall back to the larger peer id.
pub fn is_offerer(
    local: Contender<'_>,
    remote: Contender<'_>,
    answerer_agents: &[String],
) -> bool {
    if remote.id.is_mcu() {
        return false;
    }
    if local.id.is_mcu() {
        return true;
    }

    let local_answers = local.agent.is_family_of(answerer_agents);
    let remote_answers = remote.agent.is_family_of(answerer_agents);
    if local_answers != remote_answers {
        return remote_answers;
    }

    if local.tie_breaker != remote.tie_breaker {
        return local.tie_breaker > remote.tie_breaker;
    }
    local.id > remote.id
}

/// Join timestamp in milliseconds with a random fractional part.
pub fn initial_tie_breaker() -> f64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or_default();
    let jitter = (Uuid::new_v4().as_u128() % 1_000_000) as f64 / 1_000_000.0;
    millis + jitter
}
