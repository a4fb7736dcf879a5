use serde::{Deserialize, Serialize};

// ============================================================================
// Crawl report: summary of one exploration run
// ============================================================================

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// Element graph exhausted within the configured bounds
    Completed,
    /// A fatal error stopped the run
    Aborted { reason: String },
}

/// Counters collected while crawling.
///
/// Built by the crawl engine at the end of a run and consumed by the
/// console formatter and the optional JSON report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    /// App under test
    pub app_id: String,

    pub outcome: CrawlOutcome,

    /// Distinct element identities activated (or attempted)
    pub elements_visited: usize,

    /// Distinct UI states (snapshot hashes) entered for exploration
    pub screens_discovered: usize,

    /// Deepest exploration level entered
    pub deepest_depth: usize,

    pub clicks: usize,
    pub scrolls: usize,
    pub backtracks: usize,
    pub backtrack_failures: usize,
    pub crashes: usize,
    pub recoveries: usize,
    pub screenshots: usize,

    /// Click path length when the run ended
    pub final_path_len: usize,

    /// Wall-clock duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
}

impl CrawlReport {
    /// Set the total execution duration.
    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn completed(&self) -> bool {
        self.outcome == CrawlOutcome::Completed
    }
}
