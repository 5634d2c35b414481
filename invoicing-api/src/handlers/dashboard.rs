//! Dashboard analytics endpoints.

use axum::extract::{Json, Query, State};
use chrono::{Datelike, Months, NaiveDate, Utc};
use platform_core::error::AppError;

use crate::dtos::dashboard::{
    DateRangeQuery, RevenueResponse, SummaryResponse, TopClientsQuery, TopClientsResponse,
};
use crate::middleware::CurrentUser;
use crate::startup::AppState;

const DEFAULT_RANGE_MONTHS: u32 = 12;
const DEFAULT_TOP_CLIENTS: i64 = 5;
const MAX_TOP_CLIENTS: i64 = 50;

/// Default range: the last twelve months, aligned to month start.
fn default_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let month_start = today.with_day(1).unwrap_or(today);
    let from = month_start
        .checked_sub_months(Months::new(DEFAULT_RANGE_MONTHS - 1))
        .unwrap_or(month_start);
    (from, today)
}

fn resolve_range(query_from: Option<NaiveDate>, query_to: Option<NaiveDate>) -> Result<(NaiveDate, NaiveDate), AppError> {
    let today = Utc::now().date_naive();
    let (default_from, default_to) = default_range(today);
    let from = query_from.unwrap_or(default_from);
    let to = query_to.unwrap_or(default_to);

    if from > to {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Date range start must not be after its end"
        )));
    }

    Ok((from, to))
}

/// GET /api/dashboard/summary
pub async fn summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<SummaryResponse>, AppError> {
    let today = Utc::now().date_naive();
    let summary = state
        .db
        .dashboard_summary(current_user.company_id, today)
        .await?;

    Ok(Json(SummaryResponse { summary }))
}

/// GET /api/dashboard/revenue
pub async fn revenue(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<RevenueResponse>, AppError> {
    let (from, to) = resolve_range(query.from, query.to)?;

    let months = state
        .db
        .revenue_by_month(current_user.company_id, from, to)
        .await?;

    Ok(Json(RevenueResponse { from, to, months }))
}

/// GET /api/dashboard/top-clients
pub async fn top_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<TopClientsQuery>,
) -> Result<Json<TopClientsResponse>, AppError> {
    let (from, to) = resolve_range(query.from, query.to)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_CLIENTS)
        .clamp(1, MAX_TOP_CLIENTS);

    let clients = state
        .db
        .top_clients(current_user.company_id, from, to, limit)
        .await?;

    Ok(Json(TopClientsResponse { clients }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_range_spans_twelve_months() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
        let (from, to) = default_range(today);
        assert_eq!(from, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(to, today);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let from = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(resolve_range(Some(from), Some(to)).is_err());
    }
}
