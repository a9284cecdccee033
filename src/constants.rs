//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Repository acquisition constants
pub mod acquisition {
    /// Default byte budget for one clone (2 GiB)
    pub const DEFAULT_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Default wall-clock budget for one clone attempt (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    /// Timeout for auxiliary git commands like rev-list (seconds)
    pub const GIT_AUX_TIMEOUT_SECS: u64 = 30;
}

/// Reasoning client constants
pub mod reasoning {
    /// Default per-call timeout for a reasoning request (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

    /// Timeout for the CLI version probe at construction (seconds)
    pub const VERSION_PROBE_TIMEOUT_SECS: u64 = 10;

    /// Default model identifier
    pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

    /// Default maximum output tokens per completion
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

    /// Default executable name for the CLI transport
    pub const DEFAULT_CLI_BINARY: &str = "claude";
}

/// Retry policy constants
pub mod retry {
    /// Default maximum attempts for a reasoning call
    pub const REASONING_MAX_ATTEMPTS: u32 = 3;

    /// Default maximum attempts for a persistence call
    pub const PERSISTENCE_MAX_ATTEMPTS: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Fixed delay before the single malformed-output retry (milliseconds)
    pub const MALFORMED_RETRY_DELAY_MS: u64 = 1_000;

    /// Default wait when rate limited without a server hint (seconds)
    pub const RATE_LIMIT_DEFAULT_WAIT_SECS: u64 = 30;
}

/// Working-tree structure summary constants
pub mod structure {
    /// Maximum entries included in the tree summary fed to prompts
    pub const MAX_TREE_ENTRIES: usize = 2_000;

    /// Maximum directory depth shown in the tree summary
    pub const MAX_TREE_DEPTH: usize = 6;
}
