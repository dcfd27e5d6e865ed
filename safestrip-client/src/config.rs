use std::env;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const API_URL_DEV_VAR: &str = "SAFESTRIP_API_URL_DEV";
const API_URL_VAR: &str = "SAFESTRIP_API_URL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn from_env() -> Self {
        env::var("RUN_MODE")
            .map(|mode| RunMode::from(mode.as_str()))
            .unwrap_or_default()
    }
}

impl From<&str> for RunMode {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "release" => RunMode::Production,
            _ => RunMode::Development,
        }
    }
}

impl Display for RunMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RunMode::Development => write!(f, "development"),
            RunMode::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Api {
    /// Base URL used in development builds
    #[serde(default)]
    pub dev_url: Option<String>,
    /// Base URL used in production builds
    #[serde(default)]
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// GoTrue compatible auth server root
    pub url: String,
    /// Public anon key sent as `apikey`
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    /// File holding persisted UI state
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub run_mode: RunMode,
    pub logger: Logger,
    pub api: Api,
    #[serde(default)]
    pub identity: Option<Identity>,
    pub storage: Storage,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = RunMode::from_env();

        let mut settings: Settings = Config::builder()
            .set_default("logger.level", "info")?
            .set_default("api.timeout_secs", 10)?
            .set_default("storage.path", "safestrip-ui.json")?
            .add_source(File::with_name("configs/default").required(false))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("SAFESTRIP").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.run_mode = run_mode;

        if let Ok(url) = env::var(API_URL_DEV_VAR) {
            settings.api.dev_url = Some(url);
        }
        if let Ok(url) = env::var(API_URL_VAR) {
            settings.api.url = Some(url);
        }

        Ok(settings)
    }

    pub fn api_base_url(&self) -> String {
        resolve_api_url(
            self.run_mode,
            self.api.dev_url.as_deref(),
            self.api.url.as_deref(),
        )
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

/// Picks the base URL for `mode`, preferring the URL of the matching
/// environment and falling back to the other one, then to localhost.
pub fn resolve_api_url(mode: RunMode, dev_url: Option<&str>, prod_url: Option<&str>) -> String {
    fn present(url: Option<&str>) -> Option<&str> {
        url.map(str::trim).filter(|url| !url.is_empty())
    }

    let raw = match mode {
        RunMode::Development => present(dev_url).or(present(prod_url)),
        RunMode::Production => present(prod_url).or(present(dev_url)),
    };

    normalize_base_url(raw.unwrap_or(DEFAULT_API_URL))
}

/// Strips one trailing slash so joined paths never contain `//`.
pub fn normalize_base_url(url: &str) -> String {
    url.strip_suffix('/').unwrap_or(url).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_prefers_dev_url() {
        let url = resolve_api_url(
            RunMode::Development,
            Some("http://10.0.2.2:8000/"),
            Some("https://api.safestrip.app"),
        );
        assert_eq!(url, "http://10.0.2.2:8000");
    }

    #[test]
    fn test_production_prefers_prod_url() {
        let url = resolve_api_url(
            RunMode::Production,
            Some("http://10.0.2.2:8000"),
            Some("https://api.safestrip.app/"),
        );
        assert_eq!(url, "https://api.safestrip.app");
    }

    #[test]
    fn test_falls_back_to_other_mode() {
        assert_eq!(
            resolve_api_url(RunMode::Production, Some("http://dev:8000"), None),
            "http://dev:8000"
        );
        assert_eq!(
            resolve_api_url(RunMode::Development, Some("  "), Some("https://prod")),
            "https://prod"
        );
    }

    #[test]
    fn test_falls_back_to_localhost() {
        assert_eq!(resolve_api_url(RunMode::Development, None, None), DEFAULT_API_URL);
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!(RunMode::from("PRODUCTION"), RunMode::Production);
        assert_eq!(RunMode::from("prod"), RunMode::Production);
        assert_eq!(RunMode::from("staging"), RunMode::Development);
        assert_eq!(RunMode::Production.to_string(), "production");
    }
}
