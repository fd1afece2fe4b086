use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

pub const DEFAULT_FOOD_ALERTS_URL: &str = "https://data.food.gov.uk/food-alerts";
pub const DEFAULT_BLUESKY_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_CHECKPOINT_FILE: &str = "last_checkpoint.txt";

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60 * 60;
const DEFAULT_POST_SPACING_SECONDS: u64 = 30 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_LOOKBACK_DAYS: i64 = 7;

const NORMAL_ITEM_LIMIT: u32 = 10;
const DEBUG_ITEM_LIMIT: u32 = 5;

#[derive(Clone)]
pub struct Config {
    pub debug_mode: bool,
    pub bluesky_identifier: String,
    pub bluesky_password: String,
    pub bluesky_service_url: String,
    pub food_alerts_url: String,
    pub checkpoint_file: PathBuf,
    pub poll_interval_seconds: u64,
    pub post_spacing_seconds: u64,
    pub request_timeout_seconds: u64,
    pub lookback_days: i64,
    pub metrics_port: Option<u16>,
}

// Hand-written so the password never reaches the logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("debug_mode", &self.debug_mode)
            .field("bluesky_identifier", &self.bluesky_identifier)
            .field("bluesky_password", &"<redacted>")
            .field("bluesky_service_url", &self.bluesky_service_url)
            .field("food_alerts_url", &self.food_alerts_url)
            .field("checkpoint_file", &self.checkpoint_file)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("post_spacing_seconds", &self.post_spacing_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("lookback_days", &self.lookback_days)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let debug_mode = lookup("DEBUG_MODE").as_deref() == Some("true");

        let bluesky_identifier =
            lookup("BLUESKY_BOT_EMAIL").ok_or("BLUESKY_BOT_EMAIL is required")?;
        let bluesky_password =
            lookup("BLUESKY_BOT_PASSWORD").ok_or("BLUESKY_BOT_PASSWORD is required")?;

        let bluesky_service_url = lookup("BLUESKY_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_BLUESKY_SERVICE_URL.to_string());
        let food_alerts_url = lookup("FOOD_ALERTS_API_URL")
            .unwrap_or_else(|| DEFAULT_FOOD_ALERTS_URL.to_string());
        let checkpoint_file = lookup("CHECKPOINT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_FILE));

        let poll_interval_seconds = parse_or(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
        )?;
        let post_spacing_seconds = parse_or(
            &lookup,
            "POST_SPACING_SECONDS",
            DEFAULT_POST_SPACING_SECONDS,
        )?;
        let request_timeout_seconds = parse_or(
            &lookup,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;
        let lookback_days = parse_or(&lookup, "LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?;

        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| "METRICS_PORT must be a valid port number")?,
            ),
            None => None,
        };

        let config = Self {
            debug_mode,
            bluesky_identifier,
            bluesky_password,
            bluesky_service_url,
            food_alerts_url,
            checkpoint_file,
            poll_interval_seconds,
            post_spacing_seconds,
            request_timeout_seconds,
            lookback_days,
            metrics_port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Result<Self, String> {
        if cli.debug {
            self.debug_mode = true;
        }
        if let Some(path) = &cli.checkpoint_file {
            self.checkpoint_file = path.clone();
        }
        if let Some(url) = &cli.alerts_url {
            self.food_alerts_url = url.clone();
        }
        if let Some(secs) = cli.poll_interval {
            self.poll_interval_seconds = secs;
        }
        if let Some(port) = cli.metrics_port {
            self.metrics_port = Some(port);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), String> {
        if self.poll_interval_seconds == 0 {
            return Err("POLL_INTERVAL_SECONDS must be greater than zero".into());
        }
        if self.request_timeout_seconds == 0 {
            return Err("REQUEST_TIMEOUT_SECONDS must be greater than zero".into());
        }
        if self.lookback_days < 0 {
            return Err("LOOKBACK_DAYS must not be negative".into());
        }
        Ok(())
    }

    /// Number of feed items requested per tick.
    pub fn item_limit(&self) -> u32 {
        if self.debug_mode {
            DEBUG_ITEM_LIMIT
        } else {
            NORMAL_ITEM_LIMIT
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn post_spacing(&self) -> Duration {
        Duration::from_secs(self.post_spacing_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookback_days)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
