use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crawler::config::CrawlerConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "app-crawler",
    version,
    about = "Depth-first UI crawler for mobile apps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: app-crawler.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl an app by activating every reachable element
    Crawl {
        /// Package id of the app under test
        #[arg(long)]
        app_id: Option<String>,

        /// Activity to launch
        #[arg(long)]
        launch_activity: Option<String>,

        /// Appium server URL
        #[arg(long)]
        server: Option<String>,

        /// Maximum exploration depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum forward scrolls per screen
        #[arg(long)]
        max_scrolls: Option<usize>,

        /// Crash ceiling for the whole run
        #[arg(long)]
        max_crashes: Option<usize>,

        /// Directory for screenshots (disabled when unset)
        #[arg(long)]
        screenshots_dir: Option<String>,

        /// JSONL crawl trace file
        #[arg(long)]
        trace: Option<String>,

        /// Write the crawl report as JSON to this file
        #[arg(long)]
        report: Option<String>,

        /// Crawl the built-in demo app instead of a device
        #[arg(long)]
        demo: bool,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `app-crawler.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub appium: AppiumConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppiumConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Extra session capabilities, passed through as-is
    #[serde(default)]
    pub capabilities: Map<String, Value>,
}

impl Default for AppiumConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            capabilities: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub screenshots_dir: Option<String>,
    pub trace: Option<String>,
    pub report: Option<String>,
}

fn default_server_url() -> String { "http://127.0.0.1:4723".to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("app-crawler.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content),
        Err(_) => AppConfig::default(),
    }
}

pub fn parse_config(content: &str) -> AppConfig {
    match serde_yaml::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "malformed config file, using defaults");
            AppConfig::default()
        }
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Command-line overrides for the `crawler` section.
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub app_id: Option<String>,
    pub launch_activity: Option<String>,
    pub max_depth: Option<usize>,
    pub max_scrolls: Option<usize>,
    pub max_crashes: Option<usize>,
}

/// CLI flag > config file > defaults.
pub fn build_crawler_config(file: &CrawlerConfig, overrides: CrawlOverrides) -> CrawlerConfig {
    let mut config = file.clone();
    if let Some(app_id) = overrides.app_id {
        config.app_id = app_id;
    }
    if let Some(activity) = overrides.launch_activity {
        config.launch_activity = Some(activity);
    }
    if let Some(depth) = overrides.max_depth {
        config.max_depth = depth;
    }
    if let Some(scrolls) = overrides.max_scrolls {
        config.max_scrolls = scrolls;
    }
    if let Some(crashes) = overrides.max_crashes {
        config.max_crashes = crashes;
    }
    config
}

/// Session capabilities for an Android UiAutomator2 session.
///
/// Values from the config file win over the defaults, except the app package
/// and activity which always come from the crawler config.
pub fn session_capabilities(appium: &AppiumConfig, crawler: &CrawlerConfig) -> Map<String, Value> {
    let mut caps = appium.capabilities.clone();
    caps.entry("platformName")
        .or_insert_with(|| Value::from("Android"));
    caps.entry("appium:automationName")
        .or_insert_with(|| Value::from("UiAutomator2"));

    if !crawler.app_id.is_empty() {
        caps.insert("appium:appPackage".into(), Value::from(crawler.app_id.as_str()));
    }
    if let Some(activity) = &crawler.launch_activity {
        caps.insert("appium:appActivity".into(), Value::from(activity.as_str()));
    }
    caps
}
