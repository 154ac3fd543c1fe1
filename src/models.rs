use std::time::Duration;

use reqwest::header::HeaderValue;
use url::Url;

use crate::{
    BYTES_PER_MB, DEFAULT_STOP_MB, DEFAULT_TARGET_URL, DEFAULT_USER_AGENT, DEFAULT_WORKER_NUM,
    cli::Cli, error::ConfigError,
};

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workers: usize,
    pub url: Url,
    pub user_agent: HeaderValue,
    pub verbose: bool,
    /// Cumulative sent + received bytes after which the run stops.
    pub threshold_bytes: u64,
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_NUM,
            url: Url::parse(DEFAULT_TARGET_URL).expect("default url is valid"),
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
            verbose: false,
            threshold_bytes: DEFAULT_STOP_MB * BYTES_PER_MB,
            poll_interval: crate::POLL_INTERVAL,
            error_cooldown: crate::ERROR_COOLDOWN,
        }
    }
}

impl TryFrom<&Cli> for RunConfig {
    type Error = ConfigError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let megabytes = match cli.megabytes.as_deref() {
            Some(raw) => parse_megabytes(raw)?,
            None => DEFAULT_STOP_MB,
        };

        if cli.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let url = Url::parse(&cli.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }

        let user_agent = match &cli.user_agent {
            Some(ua) => HeaderValue::from_str(ua)
                .map_err(|_| ConfigError::InvalidUserAgent(ua.clone()))?,
            None => HeaderValue::from_static(DEFAULT_USER_AGENT),
        };

        Ok(Self {
            workers: cli.workers,
            url,
            user_agent,
            verbose: cli.verbose,
            threshold_bytes: megabytes.saturating_mul(BYTES_PER_MB),
            ..Default::default()
        })
    }
}

fn parse_megabytes(raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidThreshold(raw.to_string()))
}

/// Counter readings and rates at one point of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub elapsed: Duration,
    pub sent: u64,
    pub received: u64,
    /// Bytes per second.
    pub upload_speed: f64,
    /// Bytes per second.
    pub download_speed: f64,
}

impl Snapshot {
    pub fn total(&self) -> u64 {
        self.sent.saturating_add(self.received)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    ThresholdReached,
    Interrupted,
}

/// Final report of a run. The speeds in `snapshot` are averages since start.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub snapshot: Snapshot,
}
