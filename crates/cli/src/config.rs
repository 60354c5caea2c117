//! CLI configuration utilities

use anyhow::{Context, Result};
use kcc_http::{ClientConfig, DashboardClient, FileCookieStore, SessionListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Data directory: explicit flag, then `KCC_STATE_DIR`, then the platform
/// data directory
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(kcc_data_dir) = std::env::var("KCC_STATE_DIR") {
            PathBuf::from(kcc_data_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("kcc")
        }
    })
}

/// Where the refresh cookie is persisted between invocations
pub fn cookie_path(data_dir: &Path) -> PathBuf {
    data_dir.join("session").join("refresh_cookie.json")
}

/// Load client configuration from `path`, or from `config.toml` in the data
/// directory if it exists, with `KCC_*` environment overrides on top
pub fn load_client_config(path: Option<&Path>, data_dir: &Path) -> Result<ClientConfig> {
    let default_config = data_dir.join("config.toml");
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None if default_config.exists() => Some(default_config),
        None => None,
    };

    if let Some(path) = &path {
        info!("Loading configuration from: {:?}", path);
    }

    ClientConfig::load(path.as_deref()).context("invalid client configuration")
}

/// Build a client whose refresh cookie lives in the data directory
pub fn connect(config: ClientConfig, data_dir: &Path) -> Result<DashboardClient> {
    let store = FileCookieStore::new(cookie_path(data_dir));
    let client = DashboardClient::builder()
        .config(config)
        .store(Arc::new(store))
        .listener(Arc::new(LoginPrompt))
        .build()?;
    Ok(client)
}

/// Tells the user to sign in again once the session cannot be recovered
struct LoginPrompt;

impl SessionListener for LoginPrompt {
    fn session_terminated(&self, redirect_to: &str) {
        eprintln!("Your session has ended ({redirect_to}). Run `kcc login` to sign in again.");
    }
}
