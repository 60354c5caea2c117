//! Visit and stamp analytics client methods

use super::{ClientError, DashboardClient, request::ApiRequest};
use crate::types::{AnalyticsOverview, AnalyticsRange, DailyVisits};

impl DashboardClient {
    /// Totals for the range
    pub async fn analytics_overview(
        &self,
        range: AnalyticsRange,
    ) -> Result<AnalyticsOverview, ClientError> {
        let request = ApiRequest::get("/analytics/overview").query("range", range.as_str());
        self.execute(request).await
    }

    /// Per-day visits and stamps for the range, oldest first
    pub async fn daily_visits(
        &self,
        range: AnalyticsRange,
    ) -> Result<Vec<DailyVisits>, ClientError> {
        let request = ApiRequest::get("/analytics/visits").query("range", range.as_str());
        let mut days: Vec<DailyVisits> = self.execute(request).await?;
        days.sort_by_key(|day| day.date);
        Ok(days)
    }
}
