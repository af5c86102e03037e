use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the shortening backend, e.g. "https://sho.rt".
    /// Stored without a trailing slash.
    pub api_base_url: String,

    /// File backing the durable key/value storage (the signed-in identity)
    pub session_file: PathBuf,

    /// Default timeout applied to every request
    pub request_timeout: Duration,

    /// Timeout for a single liveness probe
    pub health_timeout: Duration,

    /// Period between automatic liveness probes
    pub health_interval: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_owned();

        reqwest::Url::parse(&api_base_url)
            .with_context(|| format!("API_BASE_URL must be an absolute URL, got {api_base_url:?}"))?;

        let session_file = std::env::var("SESSION_FILE")
            .unwrap_or_else(|_| "./linkly-session.json".into())
            .into();

        Ok(Self {
            api_base_url,
            session_file,
            request_timeout: secs_from_env("REQUEST_TIMEOUT_SECS", 30)?,
            health_timeout: secs_from_env("HEALTH_TIMEOUT_SECS", 10)?,
            health_interval: secs_from_env("HEALTH_INTERVAL_SECS", 60)?,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            session_file: PathBuf::from("./linkly-session.json"),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
            health_interval: Duration::from_secs(60),
        }
    }
}

fn secs_from_env(key: &str, default: u64) -> Result<Duration> {
    let secs = match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds"))?,
        Err(_) => default,
    };

    if secs == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }

    Ok(Duration::from_secs(secs))
}
