use crate::config::ForecastConfig;
use crate::errors::AppError;
use crate::ml::{self, features, Forecast, Predictor};
use crate::models::DailyCases;
use crate::sources::{weekly, ObservationSource};

/// Everything one request needs to answer with JSON or a chart.
pub struct PipelineRun {
    pub cases: Vec<DailyCases>,
    pub forecast: Forecast,
}

/// Fetch → weekly resample → features → recursive forecast.
pub async fn run_pipeline(
    sources: &dyn ObservationSource,
    model: &dyn Predictor,
    config: &ForecastConfig,
) -> Result<PipelineRun, AppError> {
    let observations = sources.fetch().await?;

    let weeks = weekly::daily_to_weekly(&observations.weather, &observations.cases);
    let features = features::construct_features(&weeks, config);
    tracing::info!(
        weeks = weeks.len(),
        feature_rows = features.len(),
        "Prepared feature history"
    );

    let forecast = ml::multi_step_forecast(model, &features, config)?;
    tracing::info!(
        last_known = %forecast.last_known,
        horizon = forecast.points.len(),
        "Forecast complete"
    );

    Ok(PipelineRun {
        cases: observations.cases,
        forecast,
    })
}
