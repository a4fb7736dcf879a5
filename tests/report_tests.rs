use app_crawler::crawler::screenshot::{ScreenshotStore, sanitize_tag, screenshot_filename};
use app_crawler::driver::mock::{MockDriver, MockScreen};
use app_crawler::report::console::format_console_report;
use app_crawler::report::report_model::{CrawlOutcome, CrawlReport};
use app_crawler::trace::logger::TraceLogger;
use app_crawler::trace::trace::{TraceEvent, TraceKind};

// ============================================================================
// Helper builders
// ============================================================================

fn sample_report(outcome: CrawlOutcome) -> CrawlReport {
    CrawlReport {
        app_id: "com.example.app".into(),
        outcome,
        elements_visited: 12,
        screens_discovered: 5,
        deepest_depth: 3,
        clicks: 12,
        scrolls: 2,
        backtracks: 4,
        backtrack_failures: 0,
        crashes: 1,
        recoveries: 1,
        screenshots: 14,
        final_path_len: 1,
        duration_ms: None,
    }
}

// ============================================================================
// Console report
// ============================================================================

#[test]
fn console_report_lists_counters() {
    let output = format_console_report(&sample_report(CrawlOutcome::Completed));

    assert!(output.starts_with("=== Crawl: com.example.app ==="));
    assert!(output.contains("elements visited     12"));
    assert!(output.contains("crashes              1"));
    assert!(output.contains("\u{2713} Completed"));
}

#[test]
fn console_report_shows_abort_reason_and_duration() {
    let report = sample_report(CrawlOutcome::Aborted {
        reason: "crash limit reached (10/10), stopping".into(),
    })
    .with_duration(42_000);
    let output = format_console_report(&report);

    assert!(output.contains("\u{2717} Aborted: crash limit reached"));
    assert!(output.contains("in 42.0s"));
    assert!(!report.completed());
}

#[test]
fn report_serializes_outcome_with_status_tag() {
    let json = serde_json::to_value(sample_report(CrawlOutcome::Aborted { reason: "boom".into() })).unwrap();
    assert_eq!(json["outcome"]["status"], "aborted");
    assert_eq!(json["outcome"]["reason"], "boom");
    assert!(json.get("duration_ms").is_none(), "Unset duration is omitted");
}

// ============================================================================
// Screenshots
// ============================================================================

#[test]
fn screenshot_names_are_sanitized() {
    assert_eq!(sanitize_tag("after_click_btn-ok-OK"), "after_click_btn-ok-OK");
    assert_eq!(sanitize_tag("after click/Ok?"), "after_click_Ok_");
    assert_eq!(screenshot_filename(7, "after_scroll_2"), "screenshot_7_after_scroll_2.png");
}

#[test]
fn screenshot_store_creates_directory_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("shots");
    let mut driver = MockDriver::new("com.example.app", "home").with_screen(MockScreen::new("home"));
    let mut store = ScreenshotStore::new(&target);

    let first = store.capture(&mut driver, "start").unwrap();
    let second = store.capture(&mut driver, "start").unwrap();

    assert_ne!(first, second, "Counter keeps names unique");
    assert!(first.exists() && second.exists());
    assert_eq!(store.count(), 2);
}

#[test]
fn disabled_screenshot_store_does_nothing() {
    let mut driver = MockDriver::new("com.example.app", "home").with_screen(MockScreen::new("home"));
    let mut store = ScreenshotStore::disabled();

    assert!(store.capture(&mut driver, "start").is_none());
    assert_eq!(driver.screenshot_count(), 0, "Driver not asked");
    assert_eq!(store.count(), 0);
}

// ============================================================================
// Trace logger
// ============================================================================

#[test]
fn trace_logger_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let mut logger = TraceLogger::new(&path);
    assert!(logger.is_enabled());

    logger.log(&TraceEvent::now(1, 0, TraceKind::ScreenEntered));
    logger.log(&TraceEvent::now(2, 1, TraceKind::Backtrack).with_path_len(3).with_detail("ok"));

    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["kind"], "screen_entered");
    assert_eq!(lines[1]["path_len"], 3);
    assert_eq!(lines[1]["detail"], "ok");
}

#[test]
fn disabled_trace_logger_is_a_no_op() {
    let mut logger = TraceLogger::disabled();
    assert!(!logger.is_enabled());
    logger.log(&TraceEvent::now(1, 0, TraceKind::Finished));
}

#[test]
fn unopenable_trace_path_disables_logger() {
    let dir = tempfile::tempdir().unwrap();
    let mut logger = TraceLogger::new(dir.path().join("missing").join("trace.jsonl"));

    assert!(!logger.is_enabled());
    logger.log(&TraceEvent::now(1, 0, TraceKind::Finished));
}
