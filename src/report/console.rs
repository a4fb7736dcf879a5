use crate::report::report_model::{CrawlOutcome, CrawlReport};

/// Format a crawl report for terminal output.
///
/// ```text
/// === Crawl: com.example.app ===
///
///   elements visited     12
///   screens discovered   5
///   ...
///
/// === Completed in 42.0s ===
/// ```
pub fn format_console_report(report: &CrawlReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Crawl: {} ===\n\n", report.app_id));

    let rows = [
        ("elements visited", report.elements_visited),
        ("screens discovered", report.screens_discovered),
        ("deepest depth", report.deepest_depth),
        ("clicks", report.clicks),
        ("scrolls", report.scrolls),
        ("backtracks", report.backtracks),
        ("backtrack failures", report.backtrack_failures),
        ("crashes", report.crashes),
        ("recoveries", report.recoveries),
        ("screenshots", report.screenshots),
        ("final path length", report.final_path_len),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {:<20} {}\n", label, value));
    }

    let status = match &report.outcome {
        CrawlOutcome::Completed => "\u{2713} Completed".to_string(),
        CrawlOutcome::Aborted { reason } => format!("\u{2717} Aborted: {}", reason),
    };
    out.push_str(&format!("\n=== {}", status));

    if let Some(ms) = report.duration_ms {
        let secs = ms as f64 / 1000.0;
        out.push_str(&format!(" in {:.1}s", secs));
    }

    out.push_str(" ===\n");

    out
}
