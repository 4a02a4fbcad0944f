use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionStore (C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// TTL measured from `last_activity`; a background sweep deletes
    /// sessions that exceed it.
    #[serde(default = "d_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "d_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Size `N` of the in-process LRU cache fronting the backing store.
    #[serde(default = "d_cache_size")]
    pub cache_size: usize,
    /// Depth `V` of the version-snapshot ring buffer kept per session.
    #[serde(default = "d_version_buffer_size")]
    pub version_buffer_size: usize,
    /// When `|history| >= compression_threshold`, the oldest turns are
    /// collapsed into a summary string.
    #[serde(default = "d_compression_threshold")]
    pub compression_threshold: usize,
    /// Maximum turns retained verbatim after a compression pass.
    #[serde(default = "d_keep_last_turns")]
    pub keep_last_turns: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: d_ttl_seconds(),
            cleanup_interval_seconds: d_cleanup_interval(),
            cache_size: d_cache_size(),
            version_buffer_size: d_version_buffer_size(),
            compression_threshold: d_compression_threshold(),
            keep_last_turns: d_keep_last_turns(),
        }
    }
}

fn d_ttl_seconds() -> u64 {
    1_800
}
fn d_cleanup_interval() -> u64 {
    60
}
fn d_cache_size() -> usize {
    512
}
fn d_version_buffer_size() -> usize {
    5
}
fn d_compression_threshold() -> usize {
    40
}
fn d_keep_last_turns() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SessionsConfig::default();
        assert!(cfg.keep_last_turns < cfg.compression_threshold);
        assert!(cfg.ttl_seconds > cfg.cleanup_interval_seconds);
    }
}
