use std::time::Instant;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::config::{
    AppConfig, CrawlOverrides, OutputConfig, build_crawler_config, session_capabilities,
};
use crate::crawler::config::CrawlerConfig;
use crate::crawler::engine::CrawlEngine;
use crate::crawler::screenshot::ScreenshotStore;
use crate::driver::adapter::DriverAdapter;
use crate::driver::appium::AppiumSession;
use crate::driver::mock::MockDriver;
use crate::report::console::format_console_report;
use crate::report::report_model::{CrawlOutcome, CrawlReport};
use crate::state::traversal::TraversalState;
use crate::trace::logger::TraceLogger;

/// App id used by `crawl --demo` when none is configured.
pub const DEMO_APP_ID: &str = "com.example.demo";

// ============================================================================
// Logging
// ============================================================================

/// Map the `-v` count to a default filter directive.
pub fn log_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_logging(verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

// ============================================================================
// crawl subcommand
// ============================================================================

/// Everything `crawl` takes from the command line.
#[derive(Debug, Clone, Default)]
pub struct CrawlRequest {
    pub overrides: CrawlOverrides,
    pub server: Option<String>,
    pub output: OutputConfig,
    pub demo: bool,
}

/// Run a crawl and return whether it completed.
pub fn cmd_crawl(request: CrawlRequest, file: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = build_crawler_config(&file.crawler, request.overrides);
    let output = merge_output(request.output, &file.output);

    if request.demo {
        if config.app_id.is_empty() {
            config.app_id = DEMO_APP_ID.to_string();
        }
        info!(app_id = %config.app_id, "crawling built-in demo app");
        let mut driver = MockDriver::demo(&config.app_id);
        let report = crawl_with(&mut driver, &config, &output)?;
        return Ok(report.completed());
    }

    if config.app_id.is_empty() {
        return Err("no app id: pass --app-id or set crawler.app_id in the config file".into());
    }

    let server = request
        .server
        .unwrap_or_else(|| file.appium.server_url.clone());
    let capabilities = session_capabilities(&file.appium, &config);

    info!(%server, app_id = %config.app_id, "opening appium session");
    let mut session = AppiumSession::connect(&server, &capabilities)?;

    let report = crawl_with(&mut session, &config, &output)?;
    Ok(report.completed())
}

/// Drive one crawl on `driver`, print the summary and write the optional JSON report.
pub fn crawl_with<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    config: &CrawlerConfig,
    output: &OutputConfig,
) -> Result<CrawlReport, Box<dyn std::error::Error>> {
    let screenshots = output
        .screenshots_dir
        .as_deref()
        .map(ScreenshotStore::new)
        .unwrap_or_else(ScreenshotStore::disabled);
    let tracer = output
        .trace
        .as_deref()
        .map(TraceLogger::new)
        .unwrap_or_else(TraceLogger::disabled);

    let start = Instant::now();
    let mut state = TraversalState::new();
    let mut engine = CrawlEngine::new(driver, config.clone())
        .with_screenshots(screenshots)
        .with_tracer(tracer);

    let report = match engine.run_with(&mut state) {
        Ok(report) => report,
        Err(e) => engine
            .report(&state, CrawlOutcome::Aborted { reason: e.to_string() })
            .with_duration(start.elapsed().as_millis()),
    };

    print!("{}", format_console_report(&report));

    if let Some(path) = &output.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        info!(path = %path, "wrote crawl report");
    }

    Ok(report)
}

fn merge_output(cli: OutputConfig, file: &OutputConfig) -> OutputConfig {
    OutputConfig {
        screenshots_dir: cli.screenshots_dir.or_else(|| file.screenshots_dir.clone()),
        trace: cli.trace.or_else(|| file.trace.clone()),
        report: cli.report.or_else(|| file.report.clone()),
    }
}
