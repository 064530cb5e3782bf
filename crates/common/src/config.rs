use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Env var that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PORTFOLIO_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: General,
    pub api: Api,
    pub fetch: Fetch,
    pub watch: Option<Watch>,
    #[serde(default)]
    pub observability: Observability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fetch {
    pub rate_limit_pause_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Watch {
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Observability {
    pub prometheus_port: Option<u16>,
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_pages() -> usize {
    1000
}

impl Api {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Fetch {
    pub fn rate_limit_pause(&self) -> Duration {
        Duration::from_millis(self.rate_limit_pause_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Watch {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    /// Load from `path`, or from `PORTFOLIO_CONFIG` / the default location.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.map_or_else(Self::default_config_path, str::to_string);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse portfolio config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid url: {}", self.api.base_url))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "api.base_url must be http(s)"
        );
        anyhow::ensure!(
            self.api.request_timeout_secs > 0,
            "api.request_timeout_secs must be > 0"
        );
        anyhow::ensure!(self.fetch.max_pages > 0, "fetch.max_pages must be > 0");
        if let Some(watch) = &self.watch {
            anyhow::ensure!(
                watch.refresh_interval_secs > 0,
                "watch.refresh_interval_secs must be > 0"
            );
        }
        anyhow::ensure!(
            matches!(self.general.log_format.as_str(), "json" | "text"),
            "general.log_format must be \"json\" or \"text\""
        );
        Ok(())
    }

    pub fn default_config_path() -> String {
        if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
            if !p.is_empty() {
                return p;
            }
        }

        // Check config/ directory relative to cwd
        let candidate = Path::new("config/default.toml");
        if candidate.exists() {
            return candidate.to_string_lossy().to_string();
        }

        // Check next to the binary
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            let candidate = dir.join("portfolio.toml");
            if candidate.exists() {
                return candidate.to_string_lossy().to_string();
            }
        }

        "config/default.toml".to_string()
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
