//! Authentication API client methods

use super::{ClientError, DashboardClient, request::ApiRequest};
use crate::types::{AdminUser, AuthResponse, LoginRequest, LogoutRequest, RegisterRequest};
use kcc_core::validation::validators;
use tracing::{info, warn};

impl DashboardClient {
    /// Sign in and establish a session
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<AdminUser, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        validators::validate_email(&body.email, "email")
            .map_err(ClientError::invalid_input)?;

        let request = ApiRequest::post("/auth/login").json(&body)?.public();
        let response: AuthResponse = self.execute(request).await?;
        self.session().establish(response.tokens).await?;

        info!(user_id = %response.user.id, "Logged in");
        Ok(response.user)
    }

    /// Create an administrator account and its cafe, then establish a session
    pub async fn register(&self, request: RegisterRequest) -> Result<AdminUser, ClientError> {
        validators::validate_not_empty(&request.name, "name")
            .and_then(|()| validators::validate_email(&request.email, "email"))
            .and_then(|()| validators::validate_not_empty(&request.cafe_name, "cafe_name"))
            .map_err(ClientError::invalid_input)?;

        let request = ApiRequest::post("/auth/register").json(&request)?.public();
        let response: AuthResponse = self.execute(request).await?;
        self.session().establish(response.tokens).await?;

        info!(user_id = %response.user.id, "Registered");
        Ok(response.user)
    }

    /// End the session. The server is told on a best-effort basis; local
    /// credentials are cleared whatever it answers.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(refresh_token) = self.session().refresh_token().await? {
            let request = ApiRequest::post("/auth/logout")
                .json(&LogoutRequest { refresh_token })?
                .public();
            if let Err(e) = self.execute_empty(request).await {
                warn!("Server-side logout failed: {e}");
            }
        }

        self.session().clear().await
    }

    /// Whether a persisted refresh credential can resume the session
    pub async fn can_resume(&self) -> Result<bool, ClientError> {
        Ok(self.session().refresh_token().await?.is_some())
    }

    /// Get the signed-in administrator
    pub async fn me(&self) -> Result<AdminUser, ClientError> {
        self.execute(ApiRequest::get("/auth/me")).await
    }
}
