use std::time::Duration;

use tracing::{debug, trace};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::driver::adapter::{DiscoveredElement, DriverAdapter, DriverError, ElementCapability};
use crate::state::hash::{SnapshotHash, snapshot_hash};
use crate::state::identity::ElementIdentity;
use crate::state::state_model::ClickMeta;
use crate::state::traversal::TraversalState;

/// Result of one `ClickExecutor::attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickOutcome {
    pub before: SnapshotHash,
    pub after: SnapshotHash,
    /// `false` when the identity was already visited and nothing was done
    pub performed: bool,
}

impl ClickOutcome {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Performs a single tap or text entry and watches for a UI change.
#[derive(Debug, Clone)]
pub struct ClickExecutor {
    element_wait: Duration,
    change_timeout: Duration,
    change_poll: Duration,
    text_value: String,
}

impl ClickExecutor {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            element_wait: config.element_wait(),
            change_timeout: config.change_timeout(),
            change_poll: config.change_poll(),
            text_value: config.text_input_value.clone(),
        }
    }

    /// Activate `element` once.
    ///
    /// Already-visited identities are a no-op returning the current hash.
    /// Otherwise the identity is marked visited and the stable snapshot taken
    /// before the action, and a `Click` entry is appended. A timeout without a
    /// UI change is a normal outcome, not an error.
    pub fn attempt<D: DriverAdapter + ?Sized>(
        &self,
        driver: &mut D,
        state: &mut TraversalState,
        element: &DiscoveredElement,
        identity: &ElementIdentity,
    ) -> Result<ClickOutcome, CrawlError> {
        match driver.wait_for_displayed(&element.element, self.element_wait) {
            Ok(true) => {}
            Ok(false) | Err(DriverError::StaleElement(_)) => {
                return Err(CrawlError::ElementGone {
                    identity: identity.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        if state.is_visited(identity) {
            let current = snapshot_hash(&driver.snapshot()?);
            trace!(%identity, "already visited");
            return Ok(ClickOutcome {
                before: current,
                after: current,
                performed: false,
            });
        }

        // Must precede the action
        state.mark_visited(identity.clone());

        let before = snapshot_hash(&driver.snapshot()?);
        state.set_current_hash(before);
        state.snapshot_stable();

        let meta = match element.capability {
            ElementCapability::TextInput => {
                ClickMeta::text_entry(element.attributes.clone(), self.text_value.clone())
            }
            ElementCapability::Clickable => ClickMeta::tap(element.attributes.clone()),
        };
        state.push_click(identity.clone(), meta);

        let action = match element.capability {
            ElementCapability::TextInput => driver.set_value(&element.element, &self.text_value),
            ElementCapability::Clickable => driver.click(&element.element),
        };
        if let Err(e) = action {
            // The path only records performed actions
            let _ = state.pop_last();
            return Err(match e {
                DriverError::StaleElement(_) => CrawlError::ElementGone {
                    identity: identity.clone(),
                },
                other => other.into(),
            });
        }

        let after = self.wait_for_change(driver, before);
        state.set_current_hash(after);

        debug!(
            %identity,
            before = %before.short(),
            after = %after.short(),
            "interaction done"
        );

        Ok(ClickOutcome {
            before,
            after,
            performed: true,
        })
    }

    /// Poll the page hash until it differs from `before` or the timeout runs out.
    fn wait_for_change<D: DriverAdapter + ?Sized>(&self, driver: &mut D, before: SnapshotHash) -> SnapshotHash {
        let polls = (self.change_timeout.as_millis() / self.change_poll.as_millis()).max(1);

        for _ in 0..polls {
            driver.pause(self.change_poll);
            match driver.snapshot() {
                Ok(snapshot) => {
                    let hash = snapshot_hash(&snapshot);
                    if hash != before {
                        return hash;
                    }
                }
                Err(e) => trace!(error = %e, "snapshot failed while waiting for change"),
            }
        }

        before
    }
}
