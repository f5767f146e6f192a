//! Service configuration, loaded from environment variables (`.env` honored).

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
    #[error("invalid value in {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Defaults applied to extraction requests that do not override them.
#[derive(Debug, Clone)]
pub struct ExtractDefaults {
    pub settle_ms: u64,
    pub exclude_paths: Vec<String>,
}

impl Default for ExtractDefaults {
    fn default() -> Self {
        Self {
            settle_ms: 0,
            exclude_paths: vec!["admin".to_string(), "appointment".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_path: String,
    /// Origin the public site is served from; extraction fetches and preview
    /// URLs are resolved against it.
    pub site_origin: Url,
    /// Base for public object-storage URLs (usually the service's own origin).
    pub public_base_url: Url,
    pub upload_dir: PathBuf,
    /// Clinic logo shown by the admin UI. Explicit configuration, editable
    /// via the settings endpoint.
    pub logo_url: Option<String>,
    pub extract: ExtractDefaults,
}

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env_var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3400".to_string());
        let database_path = env_var("DATABASE_PATH").unwrap_or_else(|| "clinic-content.db".to_string());

        let site_origin = parse_url("SITE_ORIGIN", env_var("SITE_ORIGIN"), "http://localhost:3000")?;
        let public_base_url = parse_url(
            "PUBLIC_BASE_URL",
            env_var("PUBLIC_BASE_URL"),
            "http://localhost:3400",
        )?;

        let upload_dir = env_var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let mut extract = ExtractDefaults::default();
        if let Some(raw) = env_var("EXTRACT_SETTLE_MS") {
            extract.settle_ms = raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: "EXTRACT_SETTLE_MS",
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = env_var("EXTRACT_EXCLUDE_PATHS") {
            extract.exclude_paths = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(Self {
            bind_addr,
            database_path,
            site_origin,
            public_base_url,
            upload_dir,
            logo_url: env_var("LOGO_URL"),
            extract,
        })
    }
}

fn parse_url(
    var: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<Url, ConfigError> {
    let raw = value.unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { var, source })
}
