use serde::Serialize;
use tracing::{error, info, warn};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::crawler::replay::{ReplayError, ReplayPolicy, relaunch, replay_path};
use crate::driver::adapter::{AppState, DriverAdapter};
use crate::state::hash::snapshot_hash;
use crate::state::state_model::ClickPathEntry;
use crate::state::traversal::TraversalState;

/// Where the app stood at the last liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Foreground,
    BackgroundOrCrashed,
    Unrecoverable,
}

/// What `check_liveness` had to do to get the app back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Already in the foreground
    Foreground,
    /// Was backgrounded and has been re-activated in place
    Relaunched,
    /// Had crashed; relaunched and the last stable path replayed
    Recovered,
}

/// Keeps the app under test alive and counts crashes across the run.
#[derive(Debug)]
pub struct RecoveryManager {
    config: CrawlerConfig,
    crash_count: usize,
    status: RecoveryStatus,
}

impl RecoveryManager {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            config: config.clone(),
            crash_count: 0,
            status: RecoveryStatus::Foreground,
        }
    }

    pub fn crash_count(&self) -> usize {
        self.crash_count
    }

    pub fn status(&self) -> RecoveryStatus {
        self.status
    }

    /// Make sure the app is running in the foreground.
    ///
    /// A "not running" answer counts as a crash: at the crash ceiling this
    /// fails with `CrashLimitExceeded`, otherwise the last stable path is
    /// retraced. A backgrounded app is activated and re-checked.
    pub fn check_liveness<D: DriverAdapter + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut TraversalState,
    ) -> Result<Liveness, CrawlError> {
        let app_state = driver.query_app_state(&self.config.app_id)?;

        match app_state {
            AppState::Foreground => {
                self.status = RecoveryStatus::Foreground;
                Ok(Liveness::Foreground)
            }
            AppState::NotRunning => {
                self.status = RecoveryStatus::BackgroundOrCrashed;
                self.crash_count += 1;
                warn!(
                    crashes = self.crash_count,
                    max = self.config.max_crashes,
                    "app not running, possible crash"
                );

                if self.crash_count >= self.config.max_crashes {
                    self.status = RecoveryStatus::Unrecoverable;
                    error!(max = self.config.max_crashes, "maximum crash limit reached");
                    return Err(CrawlError::CrashLimitExceeded {
                        crashes: self.crash_count,
                        max_crashes: self.config.max_crashes,
                    });
                }

                self.recover_from_crash(driver, state)
            }
            other => {
                self.status = RecoveryStatus::BackgroundOrCrashed;
                info!(state = ?other, "app not in foreground, activating");
                driver.activate_app(&self.config.app_id)?;
                driver.pause(self.config.launch_settle());

                let now = driver.query_app_state(&self.config.app_id)?;
                if now != AppState::Foreground {
                    return Err(CrawlError::AppLaunchFailed {
                        app_id: self.config.app_id.clone(),
                        state: now,
                    });
                }

                self.status = RecoveryStatus::Foreground;
                info!("app back in foreground");
                Ok(Liveness::Relaunched)
            }
        }
    }

    fn recover_from_crash<D: DriverAdapter + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut TraversalState,
    ) -> Result<Liveness, CrawlError> {
        driver.activate_app(&self.config.app_id)?;
        driver.pause(self.config.launch_settle());

        let replay = state.restore_from_stable().to_vec();
        let attempts = self.config.max_retrace_attempts;

        for attempt in 1..=attempts {
            info!(attempt, attempts, steps = replay.len(), "retracing click path");

            match self.retrace(driver, &replay) {
                Ok(()) => {
                    if let Ok(snapshot) = driver.snapshot() {
                        state.set_current_hash(snapshot_hash(&snapshot));
                    }
                    self.status = RecoveryStatus::Foreground;
                    info!("recovered from crash");
                    return Ok(Liveness::Recovered);
                }
                Err(reason) => {
                    warn!(attempt, %reason, "retrace attempt failed");
                    driver.pause(self.config.retrace_backoff());
                }
            }
        }

        self.status = RecoveryStatus::Unrecoverable;
        error!(attempts, "failed to recover from crash");
        Err(CrawlError::CrashRecoveryFailed { attempts })
    }

    /// One fresh launch plus a strict replay of `path`.
    fn retrace<D: DriverAdapter + ?Sized>(
        &self,
        driver: &mut D,
        path: &[ClickPathEntry],
    ) -> Result<(), String> {
        relaunch(driver, &self.config).map_err(|e| ReplayError::Relaunch(e).to_string())?;
        replay_path(driver, path, &ReplayPolicy::retrace(&self.config)).map_err(|e| e.to_string())?;

        match driver.query_app_state(&self.config.app_id) {
            Ok(AppState::Foreground) => Ok(()),
            Ok(other) => Err(format!("app ended replay in state {other:?}")),
            Err(e) => Err(e.to_string()),
        }
    }
}
