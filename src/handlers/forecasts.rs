use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{ForecastResponse, WeeklyForecast};
use crate::pipeline::run_pipeline;

pub async fn get_forecast(
    State(state): State<AppState>,
) -> Result<Json<ForecastResponse>, AppError> {
    let run = run_pipeline(
        state.sources.as_ref(),
        state.model.as_ref(),
        &state.config.forecast,
    )
    .await?;

    Ok(Json(ForecastResponse {
        forecast_horizon_weeks: state.config.forecast.horizon_weeks,
        last_data_week: run.forecast.last_known,
        forecasts: run
            .forecast
            .points
            .iter()
            .map(|p| WeeklyForecast {
                date: p.date,
                predicted_cases: p.value,
            })
            .collect(),
    }))
}
