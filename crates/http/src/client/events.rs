//! Events and promotions client methods

use super::request::{ApiRequest, encode_segment};
use super::{ClientError, DashboardClient};
use crate::types::{CafeEvent, EventRequest};
use kcc_core::validation::validators;

fn validate_event(event: &EventRequest) -> Result<(), ClientError> {
    validators::validate_not_empty(&event.title, "title")
        .map_err(ClientError::invalid_input)?;
    if event.ends_at < event.starts_at {
        return Err(ClientError::InvalidInput(
            "ends_at: must not be before starts_at".to_string(),
        ));
    }
    Ok(())
}

impl DashboardClient {
    pub async fn list_events(&self) -> Result<Vec<CafeEvent>, ClientError> {
        self.execute(ApiRequest::get("/events")).await
    }

    pub async fn create_event(&self, event: &EventRequest) -> Result<CafeEvent, ClientError> {
        validate_event(event)?;
        self.execute(ApiRequest::post("/events").json(event)?).await
    }

    pub async fn update_event(
        &self,
        id: &str,
        event: &EventRequest,
    ) -> Result<CafeEvent, ClientError> {
        validate_event(event)?;
        let request = ApiRequest::put(format!("/events/{}", encode_segment(id))).json(event)?;
        self.execute(request).await
    }

    pub async fn delete_event(&self, id: &str) -> Result<(), ClientError> {
        self.execute_empty(ApiRequest::delete(format!("/events/{}", encode_segment(id)))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn event(title: &str, hours: i64) -> EventRequest {
        let starts_at = Utc::now();
        EventRequest {
            title: title.to_string(),
            description: None,
            starts_at,
            ends_at: starts_at + Duration::hours(hours),
            image_url: None,
        }
    }

    #[test]
    fn test_validate_event() {
        assert!(validate_event(&event("Open mic night", 3)).is_ok());
        assert!(validate_event(&event("Same-day flash sale", 0)).is_ok());
        assert!(matches!(
            validate_event(&event("  ", 3)),
            Err(ClientError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_event(&event("Backwards", -1)),
            Err(ClientError::InvalidInput(_))
        ));
    }
}
