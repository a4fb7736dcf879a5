use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::crawler::config::CrawlerConfig;
use crate::driver::adapter::{DriverAdapter, DriverError};
use crate::state::state_model::ClickPathEntry;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("gave up at step {index} after {consecutive} consecutive failures")]
    TooManyFailures { index: usize, consecutive: usize },

    #[error("relaunch failed: {0}")]
    Relaunch(#[source] DriverError),
}

/// How forgiving a replay is.
#[derive(Debug, Clone)]
pub struct ReplayPolicy {
    /// Consecutive step failures skipped before the replay is abandoned
    pub max_consecutive_failures: usize,
    pub element_wait: Duration,
    pub step_pause: Duration,
    pub scroll_pause: Duration,
}

impl ReplayPolicy {
    /// Backtracking tolerates a few missing elements.
    pub fn backtrack(config: &CrawlerConfig) -> Self {
        Self {
            max_consecutive_failures: config.max_replay_skips,
            element_wait: Duration::from_millis(config.replay_wait_ms),
            step_pause: Duration::from_millis(config.replay_step_ms),
            scroll_pause: Duration::from_millis(config.replay_step_ms / 2),
        }
    }

    /// Crash retrace fails on the first step that cannot be replayed.
    pub fn retrace(config: &CrawlerConfig) -> Self {
        Self {
            max_consecutive_failures: 0,
            element_wait: config.element_wait(),
            step_pause: Duration::from_millis(config.replay_step_ms),
            scroll_pause: Duration::from_millis(config.replay_step_ms / 2),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub replayed: usize,
    pub skipped: usize,
}

/// Kill the app and start it again from its launch screen.
pub fn relaunch<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    config: &CrawlerConfig,
) -> Result<(), DriverError> {
    driver.terminate_app(&config.app_id)?;
    driver.pause(config.terminate_settle());
    driver.activate_app(&config.app_id)?;
    driver.pause(config.launch_settle());
    Ok(())
}

/// Re-perform `entries` in order on a freshly launched app.
pub fn replay_path<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    entries: &[ClickPathEntry],
    policy: &ReplayPolicy,
) -> Result<ReplayOutcome, ReplayError> {
    let mut outcome = ReplayOutcome::default();
    let mut consecutive = 0;

    for (index, entry) in entries.iter().enumerate() {
        match replay_entry(driver, entry, policy) {
            Ok(()) => {
                consecutive = 0;
                outcome.replayed += 1;
            }
            Err(reason) => {
                consecutive += 1;
                outcome.skipped += 1;
                if consecutive > policy.max_consecutive_failures {
                    warn!(index, %reason, "replay abandoned");
                    return Err(ReplayError::TooManyFailures { index, consecutive });
                }
                debug!(index, %reason, "skipping replay step");
            }
        }
    }

    Ok(outcome)
}

fn replay_entry<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    entry: &ClickPathEntry,
    policy: &ReplayPolicy,
) -> Result<(), String> {
    match entry {
        ClickPathEntry::Scroll { .. } => {
            driver.scroll_forward_once().map_err(|e| e.to_string())?;
            driver.pause(policy.scroll_pause);
        }
        ClickPathEntry::Click {
            identity,
            target,
            is_text_input,
            entered_value,
            ..
        } => {
            let element = driver
                .locate(target)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("'{identity}' not found"))?;

            let displayed = driver
                .wait_for_displayed(&element, policy.element_wait)
                .map_err(|e| e.to_string())?;
            if !displayed {
                return Err(format!("'{identity}' not displayed"));
            }

            if *is_text_input {
                let value = entered_value.as_deref().unwrap_or("random");
                driver.set_value(&element, value).map_err(|e| e.to_string())?;
            } else {
                driver.click(&element).map_err(|e| e.to_string())?;
            }
            driver.pause(policy.step_pause);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockElement, MockScreen};
    use crate::state::identity::ElementAttributes;
    use crate::state::state_model::ClickMeta;
    use crate::state::traversal::TraversalState;

    fn config() -> CrawlerConfig {
        CrawlerConfig::for_app("com.example.test")
    }

    #[test]
    fn retrace_is_strict_and_backtrack_is_lenient() {
        assert_eq!(ReplayPolicy::retrace(&config()).max_consecutive_failures, 0);
        assert_eq!(ReplayPolicy::backtrack(&config()).max_consecutive_failures, 3);
        assert_eq!(ReplayPolicy::retrace(&config()).element_wait, Duration::from_secs(5));
    }

    #[test]
    fn skipped_step_resets_after_a_success() {
        let mut driver = MockDriver::new("com.example.test", "home")
            .with_screen(MockScreen::new("home").with(MockElement::button("present")));
        let mut state = TraversalState::new();
        for id in ["missing", "present", "missing_too"] {
            let target = ElementAttributes::new(id, "", "");
            state.push_click(target.identity(), ClickMeta::tap(target));
        }

        let policy = ReplayPolicy {
            max_consecutive_failures: 1,
            ..ReplayPolicy::backtrack(&config())
        };
        let outcome = replay_path(&mut driver, state.click_path(), &policy).unwrap();

        assert_eq!(outcome, ReplayOutcome { replayed: 1, skipped: 2 });
    }

    #[test]
    fn text_entries_replay_their_value() {
        let mut driver = MockDriver::new("com.example.test", "form")
            .with_screen(MockScreen::new("form").with(MockElement::text_field("name")));
        let mut state = TraversalState::new();
        let target = ElementAttributes::new("name", "", "");
        state.push_click(target.identity(), ClickMeta::text_entry(target, "random"));

        replay_path(&mut driver, state.click_path(), &ReplayPolicy::retrace(&config())).unwrap();

        assert_eq!(driver.commands, vec!["set_value:name--=random"]);
    }
}
