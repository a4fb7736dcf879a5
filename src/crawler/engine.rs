use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::crawler::config::CrawlerConfig;
use crate::crawler::error::CrawlError;
use crate::crawler::executor::ClickExecutor;
use crate::crawler::recovery::{Liveness, RecoveryManager, RecoveryStatus};
use crate::crawler::replay::{ReplayError, ReplayPolicy, relaunch, replay_path};
use crate::crawler::screenshot::ScreenshotStore;
use crate::driver::adapter::{DiscoveredElement, DriverAdapter};
use crate::report::report_model::{CrawlOutcome, CrawlReport};
use crate::state::hash::{SnapshotHash, snapshot_hash};
use crate::state::identity::ElementIdentity;
use crate::state::traversal::TraversalState;
use crate::trace::logger::TraceLogger;
use crate::trace::trace::{TraceEvent, TraceKind};

/// Where the engine's state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Exploring(usize),
    ScrollingPage,
    Backtracking,
    Recovering,
    Terminated,
}

#[derive(Debug, Default)]
struct CrawlStats {
    screens: HashSet<SnapshotHash>,
    deepest_depth: usize,
    clicks: usize,
    scrolls: usize,
    backtracks: usize,
    backtrack_failures: usize,
    recoveries: usize,
}

// ============================================================================
// Crawl engine: depth-bounded DFS over the live app
// ============================================================================

/// Top-level crawl orchestrator.
///
/// Explores screens depth-first: every unvisited element is activated once,
/// a UI change recurses one level deeper and is followed by exactly one
/// backtrack, and exhausted screens are scrolled for more elements. The
/// `TraversalState` is passed by `&mut` through every level.
pub struct CrawlEngine<'d, D: DriverAdapter + ?Sized> {
    driver: &'d mut D,
    config: CrawlerConfig,
    executor: ClickExecutor,
    recovery: RecoveryManager,
    screenshots: ScreenshotStore,
    tracer: TraceLogger,
    stats: CrawlStats,
    phase: CrawlPhase,
    depth: usize,
    step: u64,
}

impl<'d, D: DriverAdapter + ?Sized> CrawlEngine<'d, D> {
    pub fn new(driver: &'d mut D, config: CrawlerConfig) -> Self {
        Self {
            executor: ClickExecutor::new(&config),
            recovery: RecoveryManager::new(&config),
            driver,
            config,
            screenshots: ScreenshotStore::disabled(),
            tracer: TraceLogger::disabled(),
            stats: CrawlStats::default(),
            phase: CrawlPhase::Exploring(0),
            depth: 0,
            step: 0,
        }
    }

    pub fn with_screenshots(mut self, screenshots: ScreenshotStore) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn crash_count(&self) -> usize {
        self.recovery.crash_count()
    }

    /// App status seen by the most recent liveness check.
    pub fn recovery_status(&self) -> RecoveryStatus {
        self.recovery.status()
    }

    /// Crawl with a fresh traversal state.
    pub fn run(&mut self) -> Result<CrawlReport, CrawlError> {
        let mut state = TraversalState::new();
        self.run_with(&mut state)
    }

    /// Crawl from the launch screen, then release the driver session.
    ///
    /// Only fatal errors (crash ceiling, failed crash recovery) come back as
    /// `Err`; everything else is handled where it happens.
    pub fn run_with(&mut self, state: &mut TraversalState) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        info!(
            app_id = %self.config.app_id,
            max_depth = self.config.max_depth,
            max_scrolls = self.config.max_scrolls,
            max_crashes = self.config.max_crashes,
            "starting crawl"
        );

        let result = self.explore(state, 0);
        self.phase = CrawlPhase::Terminated;

        if let Err(e) = self.driver.quit() {
            warn!(error = %e, "error closing driver session");
        }

        match result {
            Ok(()) => {
                info!(visited = state.visited().len(), "crawling completed");
                self.record(TraceKind::Finished, |e| e.with_path_len(state.path_len()));
                let report = self
                    .report(state, CrawlOutcome::Completed)
                    .with_duration(started.elapsed().as_millis());
                Ok(report)
            }
            Err(e) => {
                let status = self.recovery.status();
                error!(error = %e, app_status = ?status, "crawler failed");
                self.record(TraceKind::Aborted, |ev| ev.with_detail(&e).with_app_status(status));
                Err(e)
            }
        }
    }

    /// Snapshot of the run's counters.
    pub fn report(&self, state: &TraversalState, outcome: CrawlOutcome) -> CrawlReport {
        CrawlReport {
            app_id: self.config.app_id.clone(),
            outcome,
            elements_visited: state.visited().len(),
            screens_discovered: self.stats.screens.len(),
            deepest_depth: self.stats.deepest_depth,
            clicks: self.stats.clicks,
            scrolls: self.stats.scrolls,
            backtracks: self.stats.backtracks,
            backtrack_failures: self.stats.backtrack_failures,
            crashes: self.recovery.crash_count(),
            recoveries: self.stats.recoveries,
            screenshots: self.screenshots.count(),
            final_path_len: state.path_len(),
            duration_ms: None,
        }
    }

    // ------------------------------------------------------------------
    // Exploring(depth)
    // ------------------------------------------------------------------

    fn explore(&mut self, state: &mut TraversalState, depth: usize) -> Result<(), CrawlError> {
        if depth >= self.config.max_depth {
            info!(depth, "maximum depth reached, backtracking");
            return Ok(());
        }

        let parent_depth = self.depth;
        self.depth = depth;
        self.stats.deepest_depth = self.stats.deepest_depth.max(depth);

        state.enter_screen();
        let result = self.explore_screen(state, depth);
        state.leave_screen();

        self.depth = parent_depth;
        result
    }

    fn explore_screen(&mut self, state: &mut TraversalState, depth: usize) -> Result<(), CrawlError> {
        info!(depth, "exploring page");

        loop {
            self.phase = CrawlPhase::Exploring(depth);
            self.ensure_foreground(state)?;

            if let Some(hash) = self.current_hash() {
                if self.stats.screens.insert(hash) {
                    self.record(TraceKind::ScreenEntered, |e| e.with_hash(hash));
                }
            }

            // Element refs do not survive the relaunch a backtrack does
            if self.explore_frontier(state, depth)? {
                continue;
            }

            self.phase = CrawlPhase::ScrollingPage;
            if !self.scroll_page(state) {
                break;
            }
        }

        Ok(())
    }

    /// One pass over the unvisited elements on screen.
    ///
    /// Returns `true` when the pass stopped after a navigation or a crash
    /// recovery and the screen has to be enumerated again.
    fn explore_frontier(&mut self, state: &mut TraversalState, depth: usize) -> Result<bool, CrawlError> {
        let elements = match self.driver.find_interactable() {
            Ok(elements) => elements,
            Err(e) => {
                warn!(error = %e, "error getting clickable elements");
                return Ok(false);
            }
        };

        let found = elements.len();
        let frontier: Vec<(ElementIdentity, DiscoveredElement)> = elements
            .into_iter()
            .map(|el| (el.attributes.identity(), el))
            .filter(|(identity, _)| !state.is_visited(identity))
            .collect();
        debug!(depth, found, frontier = frontier.len(), "enumerated clickable elements");

        for (identity, element) in &frontier {
            if state.is_visited(identity) {
                continue;
            }

            match self.visit(state, depth, element, identity) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(CrawlError::ElementGone { .. }) => {
                    debug!(%identity, "element gone, skipping");
                }
                Err(e) => {
                    warn!(%identity, error = %e, "error processing element");
                    if self.ensure_foreground(state)? == Some(Liveness::Recovered) {
                        return Ok(true);
                    }
                }
            }
        }

        Ok(false)
    }

    /// Activate one element and, on navigation, explore the new screen and come back.
    fn visit(
        &mut self,
        state: &mut TraversalState,
        depth: usize,
        element: &DiscoveredElement,
        identity: &ElementIdentity,
    ) -> Result<bool, CrawlError> {
        let mark = state.path_len();
        let outcome = self.executor.attempt(&mut *self.driver, state, element, identity)?;
        if !outcome.performed {
            return Ok(false);
        }

        self.stats.clicks += 1;
        debug!(depth, %identity, "clicked element");
        self.record(TraceKind::Click, |e| {
            e.with_identity(identity)
                .with_hash(outcome.after)
                .with_path_len(state.path_len())
        });
        self.screenshots
            .capture(&mut *self.driver, &format!("after_click_{identity}"));

        if !outcome.changed() {
            return Ok(false);
        }

        match self.ensure_foreground(state)? {
            Some(Liveness::Foreground) => {}
            Some(Liveness::Recovered) => {
                info!(%identity, "app crashed after click, resuming from last stable state");
                return Ok(true);
            }
            Some(Liveness::Relaunched) => {
                let now = self.current_hash();
                if now.is_none() || now == Some(outcome.before) {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }

        info!(depth, %identity, "new page detected, exploring");
        self.record(TraceKind::Navigation, |e| {
            e.with_identity(identity).with_hash(outcome.after)
        });

        self.explore(state, depth + 1)?;
        self.phase = CrawlPhase::Exploring(depth);

        let dropped = state.discard_after(mark + 1);
        if dropped > 0 {
            debug!(dropped, "discarded entries recorded on the child page");
        }

        if let Err(e) = self.backtrack(state) {
            self.stats.backtrack_failures += 1;
            warn!(error = %e, "failed to navigate back, continuing from current position");
            self.record(TraceKind::BacktrackFailed, |ev| ev.with_detail(&e));
        }

        Ok(true)
    }

    // ------------------------------------------------------------------
    // ScrollingPage
    // ------------------------------------------------------------------

    /// Scroll the current screen forward once.
    ///
    /// Returns `true` only if the page hash changed; the scroll is then
    /// recorded in the click path and counted against this screen's bound.
    pub fn scroll_page(&mut self, state: &mut TraversalState) -> bool {
        if state.scrolls_on_screen() >= self.config.max_scrolls {
            debug!(max = self.config.max_scrolls, "scroll limit reached");
            return false;
        }

        let Some(before) = self.current_hash() else {
            return false;
        };
        state.set_current_hash(before);
        state.snapshot_stable();

        if let Err(e) = self.driver.scroll_forward_once() {
            warn!(error = %e, "error scrolling");
            return false;
        }
        self.driver.pause(self.config.scroll_settle());

        let Some(after) = self.current_hash() else {
            return false;
        };
        if after == before {
            debug!("scroll did not move the page");
            return false;
        }

        state.push_scroll();
        state.set_current_hash(after);
        self.stats.scrolls += 1;

        let scrolls = state.scrolls_on_screen();
        info!(scrolls, "scrolled forward");
        self.screenshots
            .capture(&mut *self.driver, &format!("after_scroll_{scrolls}"));
        self.record(TraceKind::Scroll, |e| {
            e.with_hash(after).with_path_len(state.path_len())
        });

        true
    }

    // ------------------------------------------------------------------
    // Backtracking
    // ------------------------------------------------------------------

    /// Undo the last recorded entry by relaunching and replaying the rest.
    pub fn backtrack(&mut self, state: &mut TraversalState) -> Result<(), CrawlError> {
        let previous = self.phase;
        self.phase = CrawlPhase::Backtracking;
        self.stats.backtracks += 1;

        let result = self.replay_to_previous(state);

        self.phase = previous;
        result
    }

    fn replay_to_previous(&mut self, state: &mut TraversalState) -> Result<(), CrawlError> {
        let popped = state.pop_last()?;
        let target = state.current_index();
        debug!(?target, popped = ?popped.identity(), "navigating back");

        // The relaunch and replay can crash too; recovery must land on the parent
        state.clear_current_hash();
        state.snapshot_stable();

        relaunch(&mut *self.driver, &self.config).map_err(|e| CrawlError::BacktrackFailed {
            reason: ReplayError::Relaunch(e).to_string(),
        })?;

        let policy = ReplayPolicy::backtrack(&self.config);
        let outcome = replay_path(&mut *self.driver, state.click_path(), &policy).map_err(|e| {
            CrawlError::BacktrackFailed {
                reason: e.to_string(),
            }
        })?;

        if let Some(hash) = self.current_hash() {
            state.set_current_hash(hash);
        }

        debug!(replayed = outcome.replayed, skipped = outcome.skipped, "back on previous page");
        self.record(TraceKind::Backtrack, |e| e.with_path_len(state.path_len()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Run a liveness check. Non-fatal failures are logged and yield `None`.
    fn ensure_foreground(&mut self, state: &mut TraversalState) -> Result<Option<Liveness>, CrawlError> {
        let previous = self.phase;
        self.phase = CrawlPhase::Recovering;
        let result = self.recovery.check_liveness(&mut *self.driver, state);
        self.phase = previous;

        match result {
            Ok(liveness) => {
                if liveness == Liveness::Recovered {
                    self.stats.recoveries += 1;
                    self.record(TraceKind::Recovered, |e| e.with_path_len(state.path_len()));
                }
                Ok(Some(liveness))
            }
            Err(e) if e.is_fatal() => {
                self.phase = CrawlPhase::Terminated;
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "app not ready, retrying on next pass");
                Ok(None)
            }
        }
    }

    fn current_hash(&mut self) -> Option<SnapshotHash> {
        match self.driver.snapshot() {
            Ok(snapshot) => Some(snapshot_hash(&snapshot)),
            Err(e) => {
                warn!(error = %e, "could not read page source");
                None
            }
        }
    }

    fn record(&mut self, kind: TraceKind, build: impl FnOnce(TraceEvent) -> TraceEvent) {
        if !self.tracer.is_enabled() {
            return;
        }
        self.step += 1;
        let event = build(TraceEvent::now(self.step, self.depth, kind));
        self.tracer.log(&event);
    }
}
