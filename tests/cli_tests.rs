use app_crawler::cli::commands::{CrawlRequest, DEMO_APP_ID, cmd_crawl, log_directive};
use app_crawler::cli::config::{
    AppConfig, Cli, Commands, CrawlOverrides, OutputConfig, build_crawler_config, load_config,
    parse_config, session_capabilities,
};
use app_crawler::crawler::config::CrawlerConfig;
use clap::Parser;

// ============================================================================
// Argument parsing
// ============================================================================

#[test]
fn parses_crawl_with_overrides() {
    let cli = Cli::try_parse_from([
        "app-crawler",
        "crawl",
        "--app-id",
        "com.example.app",
        "--max-depth",
        "4",
        "--screenshots-dir",
        "shots",
        "-vv",
    ])
    .unwrap();

    assert_eq!(cli.verbose, 2);
    assert!(cli.config.is_none());
    match cli.command {
        Commands::Crawl {
            app_id,
            max_depth,
            max_scrolls,
            screenshots_dir,
            demo,
            ..
        } => {
            assert_eq!(app_id.as_deref(), Some("com.example.app"));
            assert_eq!(max_depth, Some(4));
            assert_eq!(max_scrolls, None, "Unset flags defer to the config file");
            assert_eq!(screenshots_dir.as_deref(), Some("shots"));
            assert!(!demo);
        }
    }
}

#[test]
fn config_flag_is_global() {
    let cli = Cli::try_parse_from(["app-crawler", "crawl", "--demo", "--config", "other.yaml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some("other.yaml"));
}

#[test]
fn rejects_non_numeric_bounds() {
    assert!(Cli::try_parse_from(["app-crawler", "crawl", "--max-depth", "deep"]).is_err());
}

#[test]
fn verbosity_maps_to_filter_levels() {
    assert_eq!(log_directive(0), "warn");
    assert_eq!(log_directive(1), "info");
    assert_eq!(log_directive(2), "debug");
    assert_eq!(log_directive(9), "trace");
}

// ============================================================================
// Config file
// ============================================================================

#[test]
fn missing_config_file_yields_defaults() {
    let config = load_config(Some("/nonexistent/app-crawler.yaml"));
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.appium.server_url, "http://127.0.0.1:4723");
    assert_eq!(config.crawler.max_depth, 10);
}

#[test]
fn malformed_config_yields_defaults() {
    assert_eq!(parse_config("crawler: [not, a, map"), AppConfig::default());
}

#[test]
fn partial_config_keeps_other_defaults() {
    let config = parse_config(
        r#"
appium:
  server_url: http://device-farm:4723
  capabilities:
    appium:udid: emulator-5554
crawler:
  app_id: com.example.app
  max_scrolls: 3
output:
  trace: crawl.jsonl
"#,
    );

    assert_eq!(config.appium.server_url, "http://device-farm:4723");
    assert_eq!(config.appium.capabilities["appium:udid"], "emulator-5554");
    assert_eq!(config.crawler.app_id, "com.example.app");
    assert_eq!(config.crawler.max_scrolls, 3);
    assert_eq!(config.crawler.max_depth, 10);
    assert_eq!(config.crawler.max_crashes, 10);
    assert_eq!(config.output.trace.as_deref(), Some("crawl.jsonl"));
}

#[test]
fn config_file_is_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app-crawler.yaml");
    std::fs::write(&path, "crawler:\n  max_depth: 2\n").unwrap();

    let config = load_config(path.to_str());
    assert_eq!(config.crawler.max_depth, 2);
}

// ============================================================================
// Merging
// ============================================================================

#[test]
fn cli_flags_override_config_file() {
    let file = CrawlerConfig {
        app_id: "from.file".into(),
        max_depth: 5,
        max_scrolls: 7,
        ..CrawlerConfig::default()
    };

    let merged = build_crawler_config(
        &file,
        CrawlOverrides {
            app_id: Some("from.cli".into()),
            max_depth: Some(2),
            ..CrawlOverrides::default()
        },
    );

    assert_eq!(merged.app_id, "from.cli");
    assert_eq!(merged.max_depth, 2);
    assert_eq!(merged.max_scrolls, 7, "File value kept");
    assert_eq!(merged.max_crashes, 10, "Default kept");
}

#[test]
fn capabilities_carry_app_package_and_activity() {
    let mut appium = AppConfig::default().appium;
    appium
        .capabilities
        .insert("platformName".into(), "android".into());
    let crawler = CrawlerConfig {
        launch_activity: Some(".MainActivity".into()),
        ..CrawlerConfig::for_app("com.example.app")
    };

    let caps = session_capabilities(&appium, &crawler);

    assert_eq!(caps["platformName"], "android", "Config file value wins");
    assert_eq!(caps["appium:automationName"], "UiAutomator2");
    assert_eq!(caps["appium:appPackage"], "com.example.app");
    assert_eq!(caps["appium:appActivity"], ".MainActivity");
}

// ============================================================================
// crawl --demo
// ============================================================================

#[test]
fn demo_crawl_writes_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");

    let request = CrawlRequest {
        output: OutputConfig {
            report: Some(report_path.to_string_lossy().into_owned()),
            ..OutputConfig::default()
        },
        demo: true,
        ..CrawlRequest::default()
    };

    let completed = cmd_crawl(request, &AppConfig::default()).unwrap();
    assert!(completed);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["app_id"], DEMO_APP_ID);
    assert_eq!(json["outcome"]["status"], "completed");
    assert!(json["elements_visited"].as_u64().unwrap() > 0);
}

#[test]
fn crawl_without_app_id_is_rejected() {
    let err = cmd_crawl(CrawlRequest::default(), &AppConfig::default()).unwrap_err();
    assert!(err.to_string().contains("no app id"));
}
