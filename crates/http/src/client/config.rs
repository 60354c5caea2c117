//! Client configuration

use super::error::ClientError;
use super::store::CookieOptions;
use kcc_core::validation::{ValidateConfig, validators};
use kcc_core::{Environment, SameSite};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Dashboard client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL, without a trailing slash
    pub base_url: String,
    /// Uniform transport timeout applied to every request
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Path of the credential refresh endpoint
    pub refresh_path: String,
    /// Unauthenticated entry point reported when a session ends
    pub login_route: String,
    pub environment: Environment,
    pub cookie: CookieConfig,
}

/// Refresh cookie attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub max_age_days: u32,
    pub path: String,
    pub same_site: SameSite,
    /// HTTPS-only flag; follows `environment` when unset
    pub secure: Option<bool>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
            user_agent: concat!("kcc-dashboard/", env!("CARGO_PKG_VERSION")).to_string(),
            refresh_path: "/auth/refresh".to_string(),
            login_route: "/login".to_string(),
            environment: Environment::Development,
            cookie: CookieConfig::default(),
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "refreshToken".to_string(),
            max_age_days: 7,
            path: "/".to_string(),
            same_site: SameSite::Strict,
            secure: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional file, then `KCC_*` environment
    /// variables (`KCC_BASE_URL`, `KCC_COOKIE__MAX_AGE_DAYS`, ...)
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails validation
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("KCC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL with any trailing slash removed
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    /// Attributes for issued refresh cookies. The secure flag defaults to
    /// on in production.
    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            name: self.cookie.name.clone(),
            max_age: chrono::Duration::days(i64::from(self.cookie.max_age_days)),
            path: self.cookie.path.clone(),
            secure: self
                .cookie
                .secure
                .unwrap_or_else(|| self.environment.is_production()),
            same_site: self.cookie.same_site,
        }
    }
}

impl ValidateConfig for ClientConfig {
    fn validate(&self) -> Result<(), config::ConfigError> {
        validators::validate_url(&self.base_url, "base_url")?;
        validators::validate_range(self.timeout_secs, 1, 600, "timeout_secs")?;
        validators::validate_not_empty(&self.user_agent, "user_agent")?;
        validators::validate_route(&self.refresh_path, "refresh_path")?;
        validators::validate_route(&self.login_route, "login_route")?;
        validators::validate_not_empty(&self.cookie.name, "cookie.name")?;
        validators::validate_range(self.cookie.max_age_days, 1, 365, "cookie.max_age_days")?;
        validators::validate_route(&self.cookie.path, "cookie.path")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));

        let cookie = config.cookie_options();
        assert_eq!(cookie.name, "refreshToken");
        assert_eq!(cookie.max_age, chrono::Duration::days(7));
        assert_eq!(cookie.path, "/");
        assert_eq!(cookie.same_site, SameSite::Strict);
        assert!(!cookie.secure);
    }

    #[test]
    fn test_production_cookie_is_secure() {
        let config = ClientConfig {
            environment: Environment::Production,
            ..Default::default()
        };
        assert!(config.cookie_options().secure);

        let overridden = ClientConfig {
            environment: Environment::Production,
            cookie: CookieConfig {
                secure: Some(false),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!overridden.cookie_options().secure);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = ClientConfig {
            refresh_path: "auth/refresh".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            base_url: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_base_url() {
        let config = ClientConfig {
            base_url: "https://api.kcc.pk/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.normalized_base_url(), "https://api.kcc.pk/v1");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://api.kcc.pk"
timeout_secs = 10
environment = "production"

[cookie]
max_age_days = 14
"#
        )
        .unwrap();

        let config = ClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.base_url, "https://api.kcc.pk");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.cookie.max_age_days, 14);
        assert_eq!(config.cookie.name, "refreshToken");
        assert_eq!(config.refresh_path, "/auth/refresh");
    }
}
