pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Bytes per blob chunk.
pub const CHUNK_FILE_SIZE: usize = 49152;
/// Bytes per blob chunk when either agent mishandles large binary frames.
pub const CHUNK_FILE_SIZE_CONSTRAINED: usize = 16384;
/// Characters per data URL chunk.
pub const CHUNK_DATAURL_SIZE: usize = 1212;

pub const ANSWERER_TIMEOUT_MS: u64 = 10_000;
pub const OFFERER_TIMEOUT_MS: u64 = 12_500;
pub const NO_TRICKLE_EXTRA_MS: u64 = 40_000;
pub const MCU_TIMEOUT_MS: u64 = 105_000;
pub const RETRY_BACKOFF_MS: u64 = 10_000;
pub const MAX_HEALTH_RETRIES: u32 = 30;

/// Consecutive ICE failures after which trickle ICE is turned off for a peer.
pub const ICE_FAILURE_LIMIT: u32 = 3;

pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BOOTSTRAP_ATTEMPTS: u32 = 3;
