//! Centralized configuration for the feed exchange

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::DEFAULT_PAGE_LIMIT;

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the runtime's channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer size for collaborator commands (UI → service)
    pub command_buffer_size: usize,
    /// Buffer size for the refresh-progress broadcast stream
    pub update_buffer_size: usize,
    /// Buffer size for internal pull results (refresh tasks → service)
    pub pull_result_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,     // UI commands are infrequent
            update_buffer_size: 128,     // refresh events can be bursty
            pull_result_buffer_size: 64, // bounded by concurrent pulls
        }
    }
}

impl ChannelConfig {
    /// Roomy buffers so tests never block on channel capacity
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            update_buffer_size: 256,
            pull_result_buffer_size: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Pull Configuration
// ----------------------------------------------------------------------------

/// Parameters of the per-peer pull exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Upper bound on one pull round-trip; an elapsed timeout resolves the
    /// pull as a per-peer failure instead of hanging the refresh
    pub timeout: Duration,
    /// Page size requested from each peer
    pub page_limit: u32,
    /// Cap on concurrently in-flight pulls during a refresh
    pub max_concurrent_pulls: usize,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            page_limit: DEFAULT_PAGE_LIMIT,
            max_concurrent_pulls: 4,
        }
    }
}

impl PullConfig {
    /// Short timeout so failure-path tests finish quickly
    pub fn testing() -> Self {
        Self {
            timeout: Duration::from_millis(200),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Feed Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for a feed runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    pub channels: ChannelConfig,
    pub pull: PullConfig,
}

impl FeedConfig {
    /// Configuration tuned for tests
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig::testing(),
            pull: PullConfig::testing(),
        }
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.command_buffer_size == 0 {
            return Err("command buffer size must be non-zero".to_string());
        }
        if self.channels.update_buffer_size == 0 {
            return Err("update buffer size must be non-zero".to_string());
        }
        if self.channels.pull_result_buffer_size == 0 {
            return Err("pull result buffer size must be non-zero".to_string());
        }
        if self.pull.timeout.is_zero() {
            return Err("pull timeout must be non-zero".to_string());
        }
        if self.pull.page_limit == 0 {
            return Err("page limit must be non-zero".to_string());
        }
        if self.pull.max_concurrent_pulls == 0 {
            return Err("max concurrent pulls must be non-zero".to_string());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
