// src/app.rs
//! Process wiring
//!
//! `App::connect` builds the store and key provider once from configuration
//! and hands them to the services that need them. `close` releases the store.

use std::sync::Arc;

use tracing::info;

use crate::admin::AdminService;
use crate::config::Config;
use crate::error::Result;
use crate::intake::IntakeService;
use crate::keys::{build_key_provider, KeyProvider};
use crate::store::{open_store, SubmissionStore};

pub struct App {
    store: Arc<dyn SubmissionStore>,
    keys: Arc<dyn KeyProvider>,
    intake: IntakeService,
    admin: AdminService,
}

impl App {
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.store).await?;
        let keys = build_key_provider(&config.keys).await?;
        info!(
            backend = %store.backend(),
            key_provider = %keys.kind(),
            "submission-vault connected"
        );
        Ok(Self::from_parts(config, store, keys))
    }

    /// Wire already-constructed collaborators
    pub fn from_parts(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        keys: Arc<dyn KeyProvider>,
    ) -> Self {
        let intake = IntakeService::new(Arc::clone(&store), Arc::clone(&keys));
        let admin = AdminService::from_config(config, Arc::clone(&store), Arc::clone(&keys));
        Self {
            store,
            keys,
            intake,
            admin,
        }
    }

    pub fn intake(&self) -> &IntakeService {
        &self.intake
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    pub fn keys(&self) -> &Arc<dyn KeyProvider> {
        &self.keys
    }

    pub async fn close(self) -> Result<()> {
        self.store.close().await?;
        info!("submission-vault closed");
        Ok(())
    }
}
