use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::driver::session::SessionConfig;
use crate::explorer::nav_graph::{DedupMode, ExplorerConfig, Pacing};

pub const DEFAULT_CONFIG_FILE: &str = "app-explorer.yaml";

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "app-explorer",
    version,
    about = "Autonomous UI explorer for Android apps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: app-explorer.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl an app on a device through an Appium server
    Explore(ExploreArgs),

    /// Generate Gherkin features and screen objects from a saved crawl
    Generate {
        /// Exploration report or navigation graph JSON written by `explore`
        #[arg(long)]
        graph: String,

        /// Output directory for generated features and screen objects
        #[arg(short, long, default_value = "features/generated")]
        output_dir: String,
    },
}

/// Flags of the `explore` subcommand. Every one overrides the config file.
#[derive(clap::Args, Debug, Default)]
pub struct ExploreArgs {
    /// Package of the app under test
    #[arg(long)]
    pub package: Option<String>,

    /// Launch activity of an installed app
    #[arg(long)]
    pub activity: Option<String>,

    /// APK to install and launch instead of an installed package
    #[arg(long)]
    pub app: Option<String>,

    /// Appium server URL
    #[arg(long)]
    pub server: Option<String>,

    /// Device name or serial
    #[arg(long)]
    pub device: Option<String>,

    /// Android platform version
    #[arg(long)]
    pub platform_version: Option<String>,

    /// Maximum crawl depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Type generated values into text fields
    #[arg(long, action = clap::ArgAction::Set)]
    pub fill_forms: Option<bool>,

    /// Scroll screens to discover elements below the fold
    #[arg(long, action = clap::ArgAction::Set)]
    pub scroll: Option<bool>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Screen dedup: signature or signature-and-depth
    #[arg(long, value_parser = parse_dedup)]
    pub dedup: Option<DedupMode>,

    /// Write the exploration report (graph included) as JSON
    #[arg(short, long)]
    pub output: Option<String>,

    /// Append one JSON line per crawl decision to this file
    #[arg(long)]
    pub trace: Option<String>,
}

pub fn parse_dedup(value: &str) -> Result<DedupMode, String> {
    match value {
        "signature" => Ok(DedupMode::Signature),
        "signature-and-depth" => Ok(DedupMode::SignatureAndDepth),
        other => Err(format!(
            "unknown dedup mode '{}' (expected signature or signature-and-depth)",
            other
        )),
    }
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `app-explorer.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub appium: SessionConfig,
    #[serde(default)]
    pub explore: ExploreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploreConfig {
    #[serde(default = "default_five")]
    pub max_depth: usize,

    #[serde(default = "default_true")]
    pub fill_forms: bool,

    #[serde(default = "default_true")]
    pub scroll_to_discover: bool,

    #[serde(default = "default_true")]
    pub toggle_switches: bool,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_three")]
    pub stuck_threshold: u32,

    #[serde(default = "default_three")]
    pub max_crash_recoveries: u32,

    #[serde(default)]
    pub dedup: DedupMode,

    #[serde(default)]
    pub pacing: Pacing,

    pub output: Option<String>,

    pub trace: Option<String>,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            fill_forms: true,
            scroll_to_discover: true,
            toggle_switches: true,
            timeout_secs: 300,
            stuck_threshold: 3,
            max_crash_recoveries: 3,
            dedup: DedupMode::Signature,
            pacing: Pacing::default(),
            output: None,
            trace: None,
        }
    }
}

// Serde default helpers
fn default_three() -> u32 { 3 }
fn default_five() -> usize { 5 }
fn default_true() -> bool { true }
fn default_timeout() -> u64 { 300 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or(DEFAULT_CONFIG_FILE);
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Config Builders (merge CLI args with config file)
// ============================================================================

/// Session settings: CLI > config file > defaults.
pub fn build_session_config(args: &ExploreArgs, config: &AppConfig) -> SessionConfig {
    let mut session = config.appium.clone();
    if let Some(package) = &args.package {
        session.app_package = package.clone();
    }
    if args.activity.is_some() {
        session.app_activity = args.activity.clone();
    }
    if args.app.is_some() {
        session.app = args.app.clone();
    }
    if let Some(server) = &args.server {
        session.server_url = server.clone();
    }
    if let Some(device) = &args.device {
        session.device_name = device.clone();
    }
    if args.platform_version.is_some() {
        session.platform_version = args.platform_version.clone();
    }
    session
}

/// Explorer settings: CLI > config file > defaults.
pub fn build_explorer_config(args: &ExploreArgs, config: &AppConfig) -> ExplorerConfig {
    let explore = &config.explore;
    ExplorerConfig {
        app_package: args
            .package
            .clone()
            .unwrap_or_else(|| config.appium.app_package.clone()),
        max_depth: args.max_depth.unwrap_or(explore.max_depth),
        fill_forms: args.fill_forms.unwrap_or(explore.fill_forms),
        scroll_to_discover: args.scroll.unwrap_or(explore.scroll_to_discover),
        toggle_switches: explore.toggle_switches,
        timeout_secs: args.timeout.unwrap_or(explore.timeout_secs),
        stuck_threshold: explore.stuck_threshold,
        max_crash_recoveries: explore.max_crash_recoveries,
        dedup: args.dedup.unwrap_or(explore.dedup),
        pacing: explore.pacing.clone(),
    }
}
