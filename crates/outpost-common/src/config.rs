//! Application configuration.
//!
//! Recognised options per spec.md §6 live under `[federation]`; `[server]`
//! and `[database]` are the ambient sections needed to boot the process.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Federation configuration.
    pub federation: FederationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (ActivityPub HTTP surface).
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to (ActivityPub HTTP surface).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port the Gemini-style text interface listens on.
    #[serde(default = "default_text_port")]
    pub text_port: u16,
}

/// Database connection configuration. A single `SQLite` file, per spec.md
/// §1/§5's "single process owns a single database file".
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` database file.
    pub path: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Federation configuration. Field names mirror spec.md §6's "Recognised
/// options" list.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Authority used in locally-minted `ActivityPub` URLs (`Domain`).
    pub domain: String,
    /// Minimum interval between two posts by the same author
    /// (`PostThrottleUnit`). Zero disables throttling.
    #[serde(default = "default_post_throttle", with = "humantime_seconds")]
    pub post_throttle_unit: std::time::Duration,
    /// Minimum interval between edits (`EditThrottleUnit`).
    #[serde(default = "default_edit_throttle", with = "humantime_seconds")]
    pub edit_throttle_unit: std::time::Duration,
    /// Minimum interval between shares (`ShareThrottleUnit`).
    #[serde(default = "default_share_throttle", with = "humantime_seconds")]
    pub share_throttle_unit: std::time::Duration,
    /// Maximum post body length (`MaxPostsLength`).
    #[serde(default = "default_max_post_length")]
    pub max_posts_length: usize,
    /// Maximum bio length (`MaxBioLength`).
    #[serde(default = "default_max_bio_length")]
    pub max_bio_length: usize,
    /// Maximum number of explicit recipients on a `dm`/`post/private`
    /// (`MaxRecipients`).
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
    /// Bound on reply-forwarding ancestor traversal (`MaxForwardingDepth`).
    #[serde(default = "default_max_forwarding_depth")]
    pub max_forwarding_depth: u32,
    /// Number of delivery worker tasks (`DeliveryWorkers`).
    #[serde(default = "default_delivery_workers")]
    pub delivery_workers: usize,
    /// Maximum delivery attempts before a task is abandoned
    /// (`DeliveryRetryMax`).
    #[serde(default = "default_delivery_retry_max")]
    pub delivery_retry_max: u32,
    /// Minimum interval between checkers moves (`MinCheckersInterval`).
    #[serde(default = "default_checkers_interval", with = "humantime_seconds")]
    pub min_checkers_interval: std::time::Duration,
    /// Path to a newline-separated list of blocked domains (`BlockList`).
    #[serde(default)]
    pub block_list: Option<String>,
    /// Whether a `Delete` `Announce`d by a third party (not the author, not
    /// the relaying Group) is honoured. Open question in spec.md §9;
    /// decided `false` by default (see DESIGN.md).
    #[serde(default)]
    pub accept_forwarded_deletes: bool,
}

impl FederationConfig {
    /// Load the blocklist file named by `block_list`, if any.
    pub fn load_block_list(&self) -> std::io::Result<HashSet<String>> {
        let Some(path) = &self.block_list else {
            return Ok(HashSet::new());
        };
        let contents = std::fs::read_to_string(path)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_text_port() -> u16 {
    1965
}

const fn default_max_connections() -> u32 {
    16
}

const fn default_post_throttle() -> std::time::Duration {
    std::time::Duration::from_secs(1)
}

const fn default_edit_throttle() -> std::time::Duration {
    std::time::Duration::from_secs(1)
}

const fn default_share_throttle() -> std::time::Duration {
    std::time::Duration::from_secs(1)
}

const fn default_max_post_length() -> usize {
    5000
}

const fn default_max_bio_length() -> usize {
    500
}

const fn default_max_recipients() -> usize {
    10
}

const fn default_max_forwarding_depth() -> u32 {
    4
}

const fn default_delivery_workers() -> usize {
    4
}

const fn default_delivery_retry_max() -> u32 {
    5
}

const fn default_checkers_interval() -> std::time::Duration {
    std::time::Duration::from_secs(30)
}

/// `(de)serialize` a `Duration` as a whole number of seconds, so config
/// files can just write `post_throttle_unit = 60`.
mod humantime_seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 0. `.env`, if present, populates the process environment (missing
    ///    file is not an error — deployments that set real env vars don't
    ///    need one).
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `OUTPOST_ENV`)
    /// 3. Environment variables with `OUTPOST_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let env = std::env::var("OUTPOST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("OUTPOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("OUTPOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

// See `outpost_core::services::note::tests::zero_throttle_lets_immediate_repost_through`
// for the behavioral proof that `post_throttle_unit = 0` actually disables
// throttling in `NoteService::create` — that's the crate with a
// `NoteService` to exercise it against.
