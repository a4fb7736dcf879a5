use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crawler::recovery::RecoveryStatus;
use crate::state::hash::SnapshotHash;
use crate::state::identity::ElementIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    ScreenEntered,
    Click,
    Navigation,
    Scroll,
    Backtrack,
    BacktrackFailed,
    Recovered,
    Aborted,
    Finished,
}

#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub step: u64,
    pub depth: usize,
    pub kind: TraceKind,

    pub identity: Option<String>,
    pub hash: Option<String>,
    pub path_len: Option<usize>,
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_status: Option<RecoveryStatus>,
}

impl TraceEvent {
    pub fn now(step: u64, depth: usize, kind: TraceKind) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            step,
            depth,
            kind,
            identity: None,
            hash: None,
            path_len: None,
            detail: None,
            app_status: None,
        }
    }

    pub fn with_identity(mut self, identity: &ElementIdentity) -> Self {
        self.identity = Some(identity.to_string());
        self
    }

    pub fn with_hash(mut self, hash: SnapshotHash) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    pub fn with_path_len(mut self, len: usize) -> Self {
        self.path_len = Some(len);
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_app_status(mut self, status: RecoveryStatus) -> Self {
        self.app_status = Some(status);
        self
    }
}
