pub mod health;
pub mod meters;
pub mod usage;

use crate::config::Config;
use crate::db::Repository;
use crate::error::AppError;
use axum::{routing::get, Router};
use chrono::NaiveDate;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/meters", get(meters::list_meters))
        .route("/v1/meters/:nmi", get(meters::get_meter))
        .route("/v1/usage", get(usage::get_usage))
        .route("/v1/usage/daily", get(usage::get_daily_usage))
        .layer(cors)
        .with_state(state)
}

/// Parse an optional `YYYY-MM-DD` query parameter.
fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest(format!("{} must be a YYYY-MM-DD date", name)))
        })
        .transpose()
}
