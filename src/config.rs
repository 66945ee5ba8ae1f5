//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` and `[server]` has defaults, so a minimal
//! config file only names the database path and bind address. Secrets
//! (Reddit and OpenAI credentials) are read from the environment, never
//! from this file.
//!
//! ```toml
//! [db]
//! path = "./data/harvest.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7431"
//!
//! [ingest]
//! channels = ["startups", "SaaS"]
//!
//! [completion]
//! provider = "openai"
//! model = "gpt-4o"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

/// Reddit API settings. Credentials come from `REDDIT_CLIENT_ID` and
/// `REDDIT_CLIENT_SECRET`; without them the public JSON endpoints are used.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,
    #[serde(default = "default_canonical_host")]
    pub canonical_host: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            oauth_base_url: default_oauth_base_url(),
            canonical_host: default_canonical_host(),
            user_agent: default_user_agent(),
            timeout_secs: default_source_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_source_base_url() -> String {
    "https://www.reddit.com".to_string()
}
fn default_oauth_base_url() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_canonical_host() -> String {
    "reddit.com".to_string()
}
fn default_user_agent() -> String {
    format!("signal-harvest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_source_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Channels swept by background ingestion, in order.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Recency window for top listings (`hour`, `day`, `week`, ...).
    #[serde(default = "default_window")]
    pub window: String,
    /// Items fetched per channel.
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            window: default_window(),
            limit: default_limit(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

fn default_channels() -> Vec<String> {
    [
        // Startups & indie business
        "startups",
        "indiehackers",
        "EntrepreneurRideAlong",
        "SaaS",
        // AI & builders
        "ArtificialInteligence",
        "ChatGPTPro",
        "AutoGPT",
        "LocalLLaMA",
        "LLM",
        // UX, creators, platforms
        "UXDesign",
        "contentcreators",
        "Notion",
        "youtube",
        "podcasting",
        "TikTokGrowth",
        // Consumer trends
        "Futurology",
        "Frugal",
        "povertyfinance",
        "femalefashionadvice",
        "malefashionadvice",
        // Health & performance
        "Biohackers",
        "Nootropics",
        "mentalhealth",
        "ADHD",
        "Anxiety",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_window() -> String {
    "day".to_string()
}
fn default_limit() -> usize {
    20
}
fn default_max_content_chars() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_completion_base_url(),
            timeout_secs: default_completion_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_temperature")]
    pub temperature: f32,
    /// Posts examined per insight run.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Drop insights below the thresholds even when the model returns them.
    #[serde(default = "default_enforce_thresholds")]
    pub enforce_thresholds: bool,
    #[serde(default = "default_min_novelty")]
    pub min_novelty: u8,
    #[serde(default = "default_min_urgency")]
    pub min_urgency: u8,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temperature: default_extraction_temperature(),
            batch_size: default_batch_size(),
            enforce_thresholds: default_enforce_thresholds(),
            min_novelty: default_min_novelty(),
            min_urgency: default_min_urgency(),
        }
    }
}

fn default_extraction_temperature() -> f32 {
    0.7
}
fn default_batch_size() -> usize {
    100
}
fn default_enforce_thresholds() -> bool {
    true
}
fn default_min_novelty() -> u8 {
    3
}
fn default_min_urgency() -> u8 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_temperature")]
    pub temperature: f32,
    #[serde(default = "default_discovery_count")]
    pub count: usize,
    #[serde(default = "default_fallback_channels")]
    pub fallback_channels: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            temperature: default_discovery_temperature(),
            count: default_discovery_count(),
            fallback_channels: default_fallback_channels(),
        }
    }
}

fn default_discovery_temperature() -> f32 {
    0.3
}
fn default_discovery_count() -> usize {
    5
}
fn default_fallback_channels() -> Vec<String> {
    ["Entrepreneur", "SideProject", "AItools", "startups"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

/// Upper bound on the retention horizon; keeps `now - horizon` in range.
const MAX_RETENTION_DAYS: i64 = 3650;

fn default_retention_days() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Check value ranges that serde cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Validate ingest
    if !(1..=100).contains(&config.ingest.limit) {
        anyhow::bail!("ingest.limit must be in [1, 100]");
    }
    if config.ingest.max_content_chars == 0 {
        anyhow::bail!("ingest.max_content_chars must be > 0");
    }
    match config.ingest.window.as_str() {
        "hour" | "day" | "week" | "month" | "year" | "all" => {}
        other => anyhow::bail!(
            "Unknown ingest.window: '{}'. Must be hour, day, week, month, year, or all.",
            other
        ),
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Validate extraction
    if !(0.0..=2.0).contains(&config.extraction.temperature) {
        anyhow::bail!("extraction.temperature must be in [0.0, 2.0]");
    }
    if config.extraction.batch_size == 0 {
        anyhow::bail!("extraction.batch_size must be >= 1");
    }
    if !(1..=10).contains(&config.extraction.min_novelty)
        || !(1..=10).contains(&config.extraction.min_urgency)
    {
        anyhow::bail!("extraction.min_novelty and extraction.min_urgency must be in [1, 10]");
    }

    // Validate discovery
    if !(0.0..=2.0).contains(&config.discovery.temperature) {
        anyhow::bail!("discovery.temperature must be in [0.0, 2.0]");
    }
    if config.discovery.count == 0 {
        anyhow::bail!("discovery.count must be >= 1");
    }
    if config.discovery.fallback_channels.is_empty() {
        anyhow::bail!("discovery.fallback_channels must not be empty");
    }

    // Validate retention
    if !(1..=MAX_RETENTION_DAYS).contains(&config.retention.days) {
        anyhow::bail!("retention.days must be between 1 and {}", MAX_RETENTION_DAYS);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "/tmp/harvest.sqlite"

[server]
bind = "127.0.0.1:7431"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.ingest.limit, 20);
        assert_eq!(config.ingest.window, "day");
        assert_eq!(config.ingest.max_content_chars, 5000);
        assert_eq!(config.ingest.channels.len(), 25);
        assert_eq!(config.extraction.batch_size, 100);
        assert!((config.extraction.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.extraction.enforce_thresholds);
        assert_eq!(config.retention.days, 3);
        assert_eq!(config.source.canonical_host, "reddit.com");
        assert_eq!(config.completion.model, "gpt-4o");
        assert!(config.completion.is_enabled());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let text = format!("{}\n[completion]\nprovider = \"llama\"\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("llama"));
    }

    #[test]
    fn test_rejects_out_of_range_limit() {
        let text = format!("{}\n[ingest]\nlimit = 500\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_retention() {
        let text = format!("{}\n[retention]\ndays = 0\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_retention_upper_bound() {
        let text = format!("{}\n[retention]\ndays = 3650\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        validate(&config).unwrap();

        let text = format!("{}\n[retention]\ndays = 9223372036854775807\n", MINIMAL);
        let config: Config = toml::from_str(&text).unwrap();
        assert!(validate(&config).is_err());
    }
}
