//! Notification client methods

use super::request::{ApiRequest, encode_segment};
use super::{ClientError, DashboardClient};
use crate::types::Notification;

impl DashboardClient {
    pub async fn list_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.execute(ApiRequest::get("/notifications")).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/notifications/{}/read", encode_segment(id));
        self.execute_empty(ApiRequest::post(path)).await
    }
}
