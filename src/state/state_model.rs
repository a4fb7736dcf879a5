use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::hash::SnapshotHash;
use crate::state::identity::{ElementAttributes, ElementIdentity};

/// One recorded interaction on the path from app launch to the current UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClickPathEntry {
    Click {
        identity: ElementIdentity,
        /// Attributes used to locate the element again on replay
        target: ElementAttributes,
        is_text_input: bool,
        entered_value: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Scroll {
        timestamp: DateTime<Utc>,
    },
}

impl ClickPathEntry {
    pub fn is_scroll(&self) -> bool {
        matches!(self, ClickPathEntry::Scroll { .. })
    }

    pub fn identity(&self) -> Option<&ElementIdentity> {
        match self {
            ClickPathEntry::Click { identity, .. } => Some(identity),
            ClickPathEntry::Scroll { .. } => None,
        }
    }
}

/// What the executor knows about a click at the time it is recorded.
#[derive(Debug, Clone, Default)]
pub struct ClickMeta {
    pub target: ElementAttributes,
    pub is_text_input: bool,
    pub entered_value: Option<String>,
}

impl ClickMeta {
    pub fn tap(target: ElementAttributes) -> Self {
        Self {
            target,
            is_text_input: false,
            entered_value: None,
        }
    }

    pub fn text_entry(target: ElementAttributes, value: impl Into<String>) -> Self {
        Self {
            target,
            is_text_input: true,
            entered_value: Some(value.into()),
        }
    }
}

/// Deep copy of the traversal state taken right before a risky action.
#[derive(Debug, Clone)]
pub struct StableSnapshot {
    pub click_path: Vec<ClickPathEntry>,
    pub visited: HashSet<ElementIdentity>,
    pub current_hash: Option<SnapshotHash>,
}
