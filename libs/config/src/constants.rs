//! Stream protocol constants and defaults
//!
//! Field names and addresses are part of the contract with the coordinator
//! and the bookkeeping consumer; change them only together with those.

/// Logical address the coordinator actor registers under
pub const COORDINATOR_ADDRESS: &str = "coordinator";

/// Field added to every bookkeeping entry (seconds since UNIX epoch)
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Field holding a bookkeeping entry that is not itself a mapping
pub const BOOKKEEPING_DATA_FIELD: &str = "data";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "STREAM";

/// Coordinator resolution defaults
pub mod resolver {
    /// Extra lookup attempts after the first one fails
    pub const MAX_RETRIES: u32 = 2;

    /// Delay before the first retry (milliseconds)
    pub const RETRY_DELAY_MS: u64 = 10;

    /// Exponential backoff multiplier
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;

    /// Cap on the retry delay (milliseconds)
    pub const MAX_RETRY_DELAY_MS: u64 = 1_000;

    /// Timeout for a single lookup attempt (milliseconds)
    pub const CONNECT_TIMEOUT_MS: u64 = 2_000;
}
