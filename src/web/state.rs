use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::info;

use crate::{
    api::{Gateway, Session, SessionStore, TempleApi},
    config::ConsoleConfig,
    export::PdfSettings,
};

#[derive(Clone)]
pub struct AppState {
    config: Arc<ConsoleConfig>,
    gateway: Gateway,
    sessions: SessionStore,
}

impl AppState {
    pub async fn new(config: ConsoleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("devotee-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        fs::create_dir_all(&config.export_dir)
            .await
            .with_context(|| format!("failed to create {}", config.export_dir.display()))?;

        info!(api = %config.api_base_url, "remote API configured");

        let gateway = Gateway::new(http, config.api_base_url.clone());
        Ok(Self::from_parts(config, gateway))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(config: ConsoleConfig, gateway: Gateway) -> Self {
        let sessions = SessionStore::new(chrono::Duration::days(config.session_ttl_days));
        Self {
            config: Arc::new(config),
            gateway,
            sessions,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn api_for(&self, session: Arc<Session>) -> TempleApi {
        TempleApi::new(self.gateway.clone(), session)
    }

    pub fn pdf_settings(&self) -> PdfSettings {
        PdfSettings {
            work_dir: self.config.export_dir.clone(),
            libreoffice_bin: self.config.libreoffice_bin.clone(),
        }
    }
}
