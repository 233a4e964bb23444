//! Client state shared by every command.
//!
//! One gateway per process, with the session coordinator, credential store
//! and renewer wired behind it.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::{AccountApi, DeckApi};
use crate::config::ConfigV1;
use crate::errors::GatewayError;
use crate::gateway::{normalize_base_url, Gateway};
use crate::session::{HttpRenewer, SessionCoordinator};
use crate::store::create_store;

#[derive(Clone)]
pub struct ClientState {
    /// Session-aware gateway all API calls go through.
    pub gateway: Arc<Gateway>,
    pub account: Arc<AccountApi>,
    pub decks: Arc<DeckApi>,
}

impl ClientState {
    /// Builds the HTTP client, credential store, renewer, session coordinator
    /// and gateway described by `config`.
    pub fn new(config: ConfigV1) -> Result<Self, GatewayError> {
        let api = &config.api;
        let base_url = normalize_base_url(&api.base_url)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_in_ms) = api.timeout_in_ms {
            builder = builder.timeout(Duration::from_millis(timeout_in_ms));
        }
        let http = builder.build()?;

        let refresh_url = base_url.join(api.paths.refresh.trim_start_matches('/'))?;
        let store = create_store(&config.store);
        let renewer = Arc::new(HttpRenewer::new(http.clone(), refresh_url));
        let session = Arc::new(SessionCoordinator::new(store, renewer));

        info!("Using API at {}", base_url);
        let gateway = Arc::new(Gateway::new(http, base_url, session));
        let account = Arc::new(AccountApi::new(gateway.clone(), api.paths.clone()));
        let decks = Arc::new(DeckApi::new(gateway.clone(), &api.paths.decks));

        Ok(Self {
            gateway,
            account,
            decks,
        })
    }

    pub fn session(&self) -> &Arc<SessionCoordinator> {
        self.gateway.session()
    }
}
