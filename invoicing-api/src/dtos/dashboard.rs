use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::services::database::{DashboardSummary, RevenuePoint, TopClient};

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct TopClientsQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: DashboardSummary,
}

#[derive(Debug, Serialize)]
pub struct RevenueResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub months: Vec<RevenuePoint>,
}

#[derive(Debug, Serialize)]
pub struct TopClientsResponse {
    pub clients: Vec<TopClient>,
}
