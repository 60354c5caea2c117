//! Cafe dashboard HTTP client

pub mod analytics;
pub mod auth;
pub mod cafe;
pub mod config;
pub mod error;
pub mod events;
pub mod notifications;
pub mod request;
pub mod session;
pub mod store;

pub use config::ClientConfig;

use error::ClientError;
use request::ApiRequest;
use reqwest::{ClientBuilder, Response};
use session::{SessionCoordinator, SessionListener};
use std::sync::Arc;
use store::{MemoryCookieStore, RefreshTokenStore};

/// Dashboard API client
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct DashboardClient {
    session: Arc<SessionCoordinator>,
}

impl DashboardClient {
    /// Create a client for `base_url` with default configuration and an
    /// in-memory cookie store
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> DashboardClientBuilder {
        DashboardClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.session.base_url()
    }

    /// The session coordinator behind this client
    pub fn session(&self) -> &Arc<SessionCoordinator> {
        &self.session
    }

    /// Send a request through the session coordinator and return the raw
    /// response
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        self.session.send(request).await
    }

    /// Execute a request and decode a JSON response
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(error_for_status(response).await?.json().await?)
    }

    /// Execute a request whose response body is not needed
    pub async fn execute_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        let response = self.send(request).await?;
        error_for_status(response).await?;
        Ok(())
    }
}

async fn error_for_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, message))
    }
}

/// Builder for DashboardClient
#[derive(Default)]
pub struct DashboardClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    store: Option<Arc<dyn RefreshTokenStore>>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl DashboardClientBuilder {
    /// Start from a loaded configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Where the refresh cookie is persisted (in memory by default)
    pub fn store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Who gets told when the session ends
    pub fn listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<DashboardClient, ClientError> {
        use kcc_core::validation::ValidateConfig;

        let mut config = self.config.unwrap_or_default();
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        config.validate()?;

        let http = ClientBuilder::new()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCookieStore::new()));

        Ok(DashboardClient {
            session: Arc::new(SessionCoordinator::new(
                http,
                &config,
                store,
                self.listener,
            )),
        })
    }
}
