use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use crate::api::AppState;
use crate::db::MeterSummary;
use crate::domain::Nmi;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDto {
    pub nmi: i64,
    pub meter_serial: String,
    pub unit_of_measure: String,
    pub interval_minutes: u32,
    pub readings_per_day: usize,
    pub interval_block_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
}

impl From<MeterSummary> for MeterDto {
    fn from(s: MeterSummary) -> Self {
        MeterDto {
            nmi: s.meter.nmi.as_i64(),
            readings_per_day: s.meter.expected_reading_count(),
            interval_minutes: s.meter.interval_minutes.get(),
            meter_serial: s.meter.meter_serial,
            unit_of_measure: s.meter.unit_of_measure,
            interval_block_count: s.interval_block_count,
            first_date: s.first_date,
            last_date: s.last_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetersResponse {
    pub meters: Vec<MeterDto>,
}

pub async fn list_meters(State(state): State<AppState>) -> Result<Json<MetersResponse>, AppError> {
    let meters = state
        .repo
        .meter_summaries(None)
        .await?
        .into_iter()
        .map(MeterDto::from)
        .collect();

    Ok(Json(MetersResponse { meters }))
}

pub async fn get_meter(
    Path(nmi): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MeterDto>, AppError> {
    let nmi = nmi
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("nmi must be numeric".into()))?;

    state
        .repo
        .meter_summaries(Some(Nmi::new(nmi)))
        .await?
        .into_iter()
        .next()
        .map(|s| Json(MeterDto::from(s)))
        .ok_or_else(|| AppError::NotFound(format!("No meter with NMI {}", nmi)))
}
