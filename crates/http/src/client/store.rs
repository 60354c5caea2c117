//! Persisted refresh credential storage
//!
//! The refresh credential is kept as a cookie-like entry carrying the same
//! attributes a browser cookie would: expiry, path scope, a secure
//! (HTTPS-only) flag and a SameSite policy. The access credential never
//! goes through this module.

use super::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kcc_core::SameSite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// Attributes applied to every refresh cookie the client issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub name: String,
    pub max_age: Duration,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "refreshToken".to_string(),
            max_age: Duration::days(7),
            path: "/".to_string(),
            secure: false,
            same_site: SameSite::Strict,
        }
    }
}

/// A stored refresh credential with its cookie attributes
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCookie {
    pub name: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
}

impl RefreshCookie {
    /// Issue a cookie for `value` expiring `options.max_age` from now
    pub fn issue(options: &CookieOptions, value: impl Into<String>) -> Self {
        Self::issue_at(options, value, Utc::now())
    }

    pub fn issue_at(
        options: &CookieOptions,
        value: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: options.name.clone(),
            value: value.into(),
            expires_at: now + options.max_age,
            path: options.path.clone(),
            secure: options.secure,
            same_site: options.same_site,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the cookie may be sent to `base_url`. Secure cookies only
    /// travel over HTTPS.
    pub fn allowed_for(&self, base_url: &str) -> bool {
        !self.secure || base_url.starts_with("https://")
    }
}

impl fmt::Debug for RefreshCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .finish()
    }
}

/// Storage backend for the refresh credential
///
/// Implementations return `None` from [`load`](Self::load) once the stored
/// cookie has expired.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<RefreshCookie>, StoreError>;

    async fn save(&self, cookie: RefreshCookie) -> Result<(), StoreError>;

    /// Remove the cookie. Succeeds when nothing is stored.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-process cookie jar; the refresh credential lives as long as the process
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookie: RwLock<Option<RefreshCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryCookieStore {
    async fn load(&self) -> Result<Option<RefreshCookie>, StoreError> {
        let mut cookie = self.cookie.write().await;
        if cookie.as_ref().is_some_and(RefreshCookie::is_expired) {
            debug!("Dropping expired refresh cookie");
            *cookie = None;
        }
        Ok(cookie.clone())
    }

    async fn save(&self, cookie: RefreshCookie) -> Result<(), StoreError> {
        *self.cookie.write().await = Some(cookie);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.cookie.write().await = None;
        Ok(())
    }
}

/// Cookie jar persisted as a JSON file, so a session survives restarts
#[derive(Debug, Clone)]
pub struct FileCookieStore {
    path: PathBuf,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RefreshTokenStore for FileCookieStore {
    async fn load(&self) -> Result<Option<RefreshCookie>, StoreError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cookie: RefreshCookie = serde_json::from_slice(&content)?;
        if cookie.is_expired() {
            debug!(path = %self.path.display(), "Removing expired refresh cookie");
            self.clear().await?;
            return Ok(None);
        }

        Ok(Some(cookie))
    }

    async fn save(&self, cookie: RefreshCookie) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash never leaves a truncated entry
        let tmp = self.path.with_extension("tmp");
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp).await?;
        // A leftover tmp file keeps its old mode, so restrict it before writing
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(&serde_json::to_vec_pretty(&cookie)?).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
