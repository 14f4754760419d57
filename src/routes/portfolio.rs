//! # routes::portfolio
//!
//! | Method | Path                                   | Description                      |
//! |--------|----------------------------------------|----------------------------------|
//! | GET    | `/api/portfolio/:user_id/value`        | Holdings marked to latest prices |
//! | GET    | `/api/portfolio/:user_id/history`      | Valuations + trades, `?timeframe=1D\|1W\|1M\|3M\|1Y\|ALL` |

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, models::Timeframe, state::SharedState};

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub timeframe: Option<String>,
}

/// GET /api/portfolio/:user_id/value — read-only, nothing is recorded
pub async fn get_value(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let prices = state.engine.latest_prices();
    let total = state.valuer.total_value(&user_id, &prices).await?;

    Ok(Json(json!({
        "ok":         true,
        "userId":     user_id,
        "totalValue": total,
    })))
}

/// GET /api/portfolio/:user_id/history
pub async fn get_history(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let timeframe = match query.timeframe.as_deref() {
        None => Timeframe::default(),
        Some(raw) => serde_json::from_value::<Timeframe>(json!(raw.to_uppercase()))
            .map_err(|_| AppError::BadRequest(format!("unknown timeframe '{raw}'")))?,
    };

    let points = state.valuer.history(&user_id, timeframe).await?;

    Ok(Json(json!({
        "ok":        true,
        "userId":    user_id,
        "timeframe": timeframe,
        "count":     points.len(),
        "points":    points,
    })))
}
