use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::api::{parse_date_param, AppState};
use crate::db::repo::centred_rolling_mean;
use crate::db::UsageFilter;
use crate::domain::Nmi;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    pub nmi: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl UsageQuery {
    fn to_filter(&self) -> Result<UsageFilter, AppError> {
        let nmi = self
            .nmi
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map(Nmi::new)
                    .map_err(|_| AppError::BadRequest("nmi must be numeric".into()))
            })
            .transpose()?;
        let from = parse_date_param("fromDate", self.from_date.as_deref())?;
        let to = parse_date_param("toDate", self.to_date.as_deref())?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppError::BadRequest("fromDate must be <= toDate".into()));
            }
        }

        Ok(UsageFilter { nmi, from, to })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePointDto {
    pub timestamp: NaiveDateTime,
    pub kwh: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub total_kwh: f64,
    pub points: Vec<UsagePointDto>,
}

/// Energy per interval timestamp, summed across the selected meters.
pub async fn get_usage(
    Query(params): Query<UsageQuery>,
    State(state): State<AppState>,
) -> Result<Json<UsageResponse>, AppError> {
    let filter = params.to_filter()?;
    let points = state.repo.usage_by_timestamp(&filter).await?;

    let total_kwh = points.iter().map(|p| p.kwh).sum();
    let points = points
        .into_iter()
        .map(|p| UsagePointDto {
            timestamp: p.timestamp,
            kwh: p.kwh,
        })
        .collect();

    Ok(Json(UsageResponse { total_kwh, points }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsageDto {
    pub date: NaiveDate,
    pub kwh: f64,
    pub rolling_mean_kwh: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsageResponse {
    pub window_days: usize,
    pub days: Vec<DailyUsageDto>,
}

/// Daily totals with a centred rolling mean.
pub async fn get_daily_usage(
    Query(params): Query<UsageQuery>,
    State(state): State<AppState>,
) -> Result<Json<DailyUsageResponse>, AppError> {
    let filter = params.to_filter()?;
    let window_days = state.config.rolling_window_days;

    let days = state.repo.daily_usage(&filter).await?;
    let means = centred_rolling_mean(&days, window_days);

    let days = days
        .into_iter()
        .zip(means)
        .map(|(d, rolling_mean_kwh)| DailyUsageDto {
            date: d.date,
            kwh: d.kwh,
            rolling_mean_kwh,
        })
        .collect();

    Ok(Json(DailyUsageResponse { window_days, days }))
}
