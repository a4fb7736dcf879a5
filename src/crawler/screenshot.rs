use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::driver::adapter::DriverAdapter;

/// Writes screenshots as `screenshot_<counter>_<context>.png`.
///
/// Failures are logged and swallowed; a missing screenshot never stops a crawl.
#[derive(Debug)]
pub struct ScreenshotStore {
    dir: Option<PathBuf>,
    counter: usize,
}

impl ScreenshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            counter: 0,
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            counter: 0,
        }
    }

    /// Number of screenshots written so far.
    pub fn count(&self) -> usize {
        self.counter
    }

    pub fn capture<D: DriverAdapter + ?Sized>(&mut self, driver: &mut D, context: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;

        let bytes = match driver.screenshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, context, "error taking screenshot");
                return None;
            }
        };

        if let Err(e) = fs::create_dir_all(dir) {
            warn!(error = %e, dir = %dir.display(), "cannot create screenshot directory");
            return None;
        }

        let path = dir.join(screenshot_filename(self.counter, context));
        self.counter += 1;

        match fs::write(&path, bytes) {
            Ok(()) => {
                debug!(path = %path.display(), "screenshot taken");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "error writing screenshot");
                None
            }
        }
    }
}

pub fn screenshot_filename(counter: usize, context: &str) -> String {
    format!("screenshot_{}_{}.png", counter, sanitize_tag(context))
}

/// Sanitize a free-form context tag into a safe filename fragment.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
