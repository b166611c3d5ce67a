use std::{env, path::PathBuf};

use anyhow::{Context, Result, anyhow};

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_TTL_DAYS: i64 = 7;
const MAX_SESSION_TTL_DAYS: i64 = 3650;
const DEFAULT_EXPORT_DIR: &str = "storage/exports";
const DEFAULT_LIBREOFFICE_BIN: &str = "libreoffice";

/// Runtime settings for the console, read once at startup.
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub api_base_url: String,
    pub port: u16,
    pub session_ttl_days: i64,
    pub export_dir: PathBuf,
    pub libreoffice_bin: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            session_ttl_days: DEFAULT_SESSION_TTL_DAYS,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            libreoffice_bin: DEFAULT_LIBREOFFICE_BIN.to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Build the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("TEMPLE_API_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(anyhow!(
                "TEMPLE_API_BASE_URL must be an http(s) URL, got {api_base_url}"
            ));
        }

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw}"))?,
            None => defaults.port,
        };

        let session_ttl_days = match lookup("SESSION_TTL_DAYS") {
            Some(raw) => {
                let days = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("SESSION_TTL_DAYS must be an integer, got {raw}"))?;
                if !(1..=MAX_SESSION_TTL_DAYS).contains(&days) {
                    return Err(anyhow!(
                        "SESSION_TTL_DAYS must be between 1 and {MAX_SESSION_TTL_DAYS}, got {days}"
                    ));
                }
                days
            }
            None => defaults.session_ttl_days,
        };

        let export_dir = lookup("EXPORT_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.export_dir);

        let libreoffice_bin = lookup("LIBREOFFICE_BIN")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.libreoffice_bin);

        Ok(Self {
            api_base_url,
            port,
            session_ttl_days,
            export_dir,
            libreoffice_bin,
        })
    }
}
