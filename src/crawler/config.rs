use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Crawler configuration
// ============================================================================

/// Static per-session bounds and timings for a crawl.
///
/// Every limit here is what guarantees termination: depth, scrolls per
/// screen, and the crash ceiling. Timings are in milliseconds so the struct
/// maps one-to-one onto the YAML config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Package / bundle id of the app under test
    pub app_id: String,

    /// Activity to launch (Android), passed through to the session capabilities
    pub launch_activity: Option<String>,

    /// Maximum exploration depth (default 10)
    pub max_depth: usize,

    /// Maximum forward scrolls per screen (default 10)
    pub max_scrolls: usize,

    /// Crash ceiling for the whole run (default 10)
    pub max_crashes: usize,

    /// Retrace attempts per crash (default 3)
    pub max_retrace_attempts: usize,

    /// Consecutive replay failures a backtrack tolerates (default 3)
    pub max_replay_skips: usize,

    /// Value typed into text inputs
    pub text_input_value: String,

    pub element_wait_ms: u64,
    pub change_timeout_ms: u64,
    pub change_poll_ms: u64,
    pub scroll_settle_ms: u64,
    pub replay_step_ms: u64,
    pub replay_wait_ms: u64,
    pub terminate_settle_ms: u64,
    pub launch_settle_ms: u64,
    pub retrace_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            launch_activity: None,
            max_depth: 10,
            max_scrolls: 10,
            max_crashes: 10,
            max_retrace_attempts: 3,
            max_replay_skips: 3,
            text_input_value: "random".to_string(),
            element_wait_ms: 5_000,
            change_timeout_ms: 2_000,
            change_poll_ms: 250,
            scroll_settle_ms: 1_000,
            replay_step_ms: 1_000,
            replay_wait_ms: 1_000,
            terminate_settle_ms: 1_000,
            launch_settle_ms: 2_000,
            retrace_backoff_ms: 1_000,
        }
    }
}

impl CrawlerConfig {
    pub fn for_app(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            ..Self::default()
        }
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn change_timeout(&self) -> Duration {
        Duration::from_millis(self.change_timeout_ms)
    }

    pub fn change_poll(&self) -> Duration {
        Duration::from_millis(self.change_poll_ms.max(1))
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn terminate_settle(&self) -> Duration {
        Duration::from_millis(self.terminate_settle_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn retrace_backoff(&self) -> Duration {
        Duration::from_millis(self.retrace_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bound_the_crawl() {
        let config = CrawlerConfig::for_app("com.example.app");
        assert_eq!(config.app_id, "com.example.app");
        assert_eq!((config.max_depth, config.max_scrolls, config.max_crashes), (10, 10, 10));
        assert_eq!(config.max_retrace_attempts, 3);
        assert_eq!(config.change_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = CrawlerConfig {
            change_poll_ms: 0,
            ..CrawlerConfig::default()
        };
        assert_eq!(config.change_poll(), Duration::from_millis(1));
    }
}
