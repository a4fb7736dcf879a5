use thiserror::Error;

use crate::driver::adapter::{AppState, DriverError};
use crate::state::identity::ElementIdentity;
use crate::state::traversal::TraversalError;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Element vanished or never became visible; the caller skips it
    #[error("element '{identity}' is gone")]
    ElementGone { identity: ElementIdentity },

    /// App could not be brought to the foreground; retried on the next pass
    #[error("app '{app_id}' failed to reach the foreground (state {state:?})")]
    AppLaunchFailed { app_id: String, state: AppState },

    #[error("could not recover from crash after {attempts} retrace attempts")]
    CrashRecoveryFailed { attempts: usize },

    #[error("crash limit reached ({crashes}/{max_crashes}), stopping")]
    CrashLimitExceeded { crashes: usize, max_crashes: usize },

    #[error("backtrack failed: {reason}")]
    BacktrackFailed { reason: String },

    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CrawlError {
    /// Fatal errors end the whole run; everything else is handled at the
    /// element or screen scope.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrawlError::CrashRecoveryFailed { .. } | CrawlError::CrashLimitExceeded { .. }
        )
    }
}
