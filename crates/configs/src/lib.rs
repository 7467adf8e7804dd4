use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL. Empty means "no backend configured"; the demo
    /// binary falls back to the in-memory mock in that case.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: String::new(), request_timeout_secs: default_request_timeout() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_timeout_secs: default_startup_timeout(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { token_path: default_token_path() }
    }
}

fn default_request_timeout() -> u64 { 10 }
fn default_startup_timeout() -> u64 { 5 }
fn default_refresh_interval() -> u64 { 300 }
fn default_token_path() -> String { "data/session_token.json".to_string() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.api.normalize_from_env();
        self.api.validate()?;
        self.session.validate()?;
        self.storage.normalize();
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = None; }
        }
        Ok(())
    }
}

impl ApiConfig {
    /// Fill the base URL from the environment when the TOML leaves it empty.
    pub fn normalize_from_env(&mut self) {
        if self.base_url.trim().is_empty() {
            if let Ok(url) = std::env::var("API_BASE_URL") {
                self.base_url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.trim().is_empty() {
            let lower = self.base_url.to_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(anyhow!("api.base_url must start with http:// or https://"));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("api.request_timeout_secs must be a positive number of seconds"));
        }
        Ok(())
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.startup_timeout_secs == 0 {
            return Err(anyhow!("session.startup_timeout_secs must be a positive number of seconds"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(anyhow!("session.refresh_interval_secs must be a positive number of seconds"));
        }
        Ok(())
    }
}

impl StorageConfig {
    pub fn normalize(&mut self) {
        if self.token_path.trim().is_empty() {
            self.token_path = default_token_path();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://api.example.com");
        assert_eq!(cfg.api.request_timeout_secs, 10);
        assert_eq!(cfg.session.startup_timeout_secs, 5);
        assert_eq!(cfg.storage.token_path, "data/session_token.json");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut cfg = AppConfig::default();
        cfg.api.base_url = "ftp://api.example.com".into();
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut cfg = AppConfig::default();
        cfg.session.startup_timeout_secs = 0;
        assert!(cfg.normalize_and_validate().is_err());
    }

    #[test]
    fn normalizes_empty_token_path_and_zero_workers() {
        let mut cfg = AppConfig::default();
        cfg.storage.token_path = "  ".into();
        cfg.worker_threads = Some(0);
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.storage.token_path, "data/session_token.json");
        assert_eq!(cfg.worker_threads, None);
    }
}
