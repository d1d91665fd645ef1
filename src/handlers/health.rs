use axum::{extract::State, Json};

use crate::handlers::AppState;
use crate::models::HealthResponse;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (weather_start, weather_end) = state.sources.weather_window();
    Json(HealthResponse {
        status: "ok".into(),
        weather_start,
        weather_end,
    })
}
