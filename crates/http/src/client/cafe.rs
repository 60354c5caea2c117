//! Cafe profile, onboarding and stamp verification client methods

use super::{ClientError, DashboardClient, request::ApiRequest};
use crate::types::{
    ActivateSubscriptionRequest, CafeProfile, OnboardingStatus, SetPinRequest, Subscription,
    UpdateCafeRequest, VerificationSettings,
};
use kcc_core::validation::validators;

impl DashboardClient {
    /// Get the administrator's cafe
    pub async fn get_cafe(&self) -> Result<CafeProfile, ClientError> {
        self.execute(ApiRequest::get("/cafes/me")).await
    }

    /// Update profile fields
    pub async fn update_cafe(
        &self,
        update: &UpdateCafeRequest,
    ) -> Result<CafeProfile, ClientError> {
        self.execute(ApiRequest::put("/cafes/me").json(update)?).await
    }

    /// Progress through the onboarding wizard
    pub async fn onboarding_status(&self) -> Result<OnboardingStatus, ClientError> {
        self.execute(ApiRequest::get("/cafes/me/onboarding")).await
    }

    pub async fn activate_subscription(
        &self,
        plan: impl Into<String>,
    ) -> Result<Subscription, ClientError> {
        let body = ActivateSubscriptionRequest { plan: plan.into() };
        validators::validate_not_empty(&body.plan, "plan")
            .map_err(ClientError::invalid_input)?;

        self.execute(ApiRequest::post("/subscriptions/activate").json(&body)?).await
    }

    /// Current QR code and whether a staff PIN is set
    pub async fn verification_settings(&self) -> Result<VerificationSettings, ClientError> {
        self.execute(ApiRequest::get("/cafes/me/verification")).await
    }

    /// Set the staff PIN checked when a stamp is redeemed in person
    pub async fn set_staff_pin(&self, pin: &str) -> Result<VerificationSettings, ClientError> {
        validators::validate_pin(pin, "pin").map_err(ClientError::invalid_input)?;

        let request = ApiRequest::put("/cafes/me/verification/pin").json(&SetPinRequest {
            pin: pin.to_string(),
        })?;
        self.execute(request).await
    }

    /// Issue a new QR code, invalidating printed copies of the old one
    pub async fn regenerate_qr_code(&self) -> Result<VerificationSettings, ClientError> {
        self.execute(ApiRequest::post("/cafes/me/verification/qr/regenerate"))
            .await
    }
}
