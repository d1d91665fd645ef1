use axum::{extract::State, http::header, response::IntoResponse};

use crate::chart::ForecastChart;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::pipeline::run_pipeline;

pub async fn get_plot(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let run = run_pipeline(
        state.sources.as_ref(),
        state.model.as_ref(),
        &state.config.forecast,
    )
    .await?;

    let observed: Vec<_> = run
        .cases
        .iter()
        .filter_map(|c| c.cases.map(|v| (c.date, v)))
        .collect();
    let png = ForecastChart::default().render_png(&observed, &run.forecast.points)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
