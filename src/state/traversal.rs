use std::collections::HashSet;

use chrono::Utc;
use thiserror::Error;

use crate::state::hash::SnapshotHash;
use crate::state::identity::ElementIdentity;
use crate::state::state_model::{ClickMeta, ClickPathEntry, StableSnapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraversalError {
    #[error("click path is empty, nothing to backtrack")]
    NoPathToBacktrack,
}

/// Session-scoped traversal context.
///
/// Created once per crawl and handed by `&mut` into every nested exploration.
/// `visited` only ever grows; `click_path` changes by exactly one entry per
/// push or pop.
#[derive(Debug, Default)]
pub struct TraversalState {
    click_path: Vec<ClickPathEntry>,
    visited: HashSet<ElementIdentity>,
    last_stable: Option<StableSnapshot>,
    // One scroll counter per screen currently on the DFS stack
    screen_scrolls: Vec<usize>,
    current_hash: Option<SnapshotHash>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Click path
    // ------------------------------------------------------------------

    pub fn click_path(&self) -> &[ClickPathEntry] {
        &self.click_path
    }

    pub fn path_len(&self) -> usize {
        self.click_path.len()
    }

    /// Index of the last recorded entry, `None` at the app's launch screen.
    pub fn current_index(&self) -> Option<usize> {
        self.click_path.len().checked_sub(1)
    }

    pub fn push_click(&mut self, identity: ElementIdentity, meta: ClickMeta) {
        self.click_path.push(ClickPathEntry::Click {
            identity,
            target: meta.target,
            is_text_input: meta.is_text_input,
            entered_value: meta.entered_value,
            timestamp: Utc::now(),
        });
    }

    /// Record a page-changing scroll on the current screen.
    pub fn push_scroll(&mut self) {
        self.click_path.push(ClickPathEntry::Scroll {
            timestamp: Utc::now(),
        });
        if let Some(count) = self.screen_scrolls.last_mut() {
            *count += 1;
        }
    }

    pub fn pop_last(&mut self) -> Result<ClickPathEntry, TraversalError> {
        self.click_path.pop().ok_or(TraversalError::NoPathToBacktrack)
    }

    /// Drop every entry past `len`. Returns how many were dropped.
    pub fn discard_after(&mut self, len: usize) -> usize {
        let dropped = self.click_path.len().saturating_sub(len);
        self.click_path.truncate(len);
        dropped
    }

    // ------------------------------------------------------------------
    // Visited registry
    // ------------------------------------------------------------------

    pub fn visited(&self) -> &HashSet<ElementIdentity> {
        &self.visited
    }

    pub fn is_visited(&self, identity: &ElementIdentity) -> bool {
        self.visited.contains(identity)
    }

    /// Returns `true` if the identity was not yet visited.
    pub fn mark_visited(&mut self, identity: ElementIdentity) -> bool {
        self.visited.insert(identity)
    }

    // ------------------------------------------------------------------
    // Stable snapshot
    // ------------------------------------------------------------------

    /// Must be called immediately before every action that could crash the app.
    pub fn snapshot_stable(&mut self) {
        self.last_stable = Some(StableSnapshot {
            click_path: self.click_path.clone(),
            visited: self.visited.clone(),
            current_hash: self.current_hash,
        });
    }

    pub fn last_stable(&self) -> Option<&StableSnapshot> {
        self.last_stable.as_ref()
    }

    /// Reset the click path to the last stable snapshot and return the
    /// sequence to replay from a fresh launch.
    ///
    /// Calling this repeatedly yields the same sequence. The visited registry
    /// is merged, never rolled back.
    pub fn restore_from_stable(&mut self) -> &[ClickPathEntry] {
        match &self.last_stable {
            Some(stable) => {
                self.click_path = stable.click_path.clone();
                self.visited.extend(stable.visited.iter().cloned());
                self.current_hash = stable.current_hash;
            }
            None => {
                self.click_path.clear();
                self.current_hash = None;
            }
        }
        &self.click_path
    }

    // ------------------------------------------------------------------
    // Per-screen scroll counters
    // ------------------------------------------------------------------

    pub fn enter_screen(&mut self) {
        self.screen_scrolls.push(0);
    }

    pub fn leave_screen(&mut self) {
        self.screen_scrolls.pop();
    }

    pub fn scrolls_on_screen(&self) -> usize {
        self.screen_scrolls.last().copied().unwrap_or(0)
    }

    pub fn current_hash(&self) -> Option<SnapshotHash> {
        self.current_hash
    }

    pub fn set_current_hash(&mut self, hash: SnapshotHash) {
        self.current_hash = Some(hash);
    }

    pub fn clear_current_hash(&mut self) {
        self.current_hash = None;
    }
}
