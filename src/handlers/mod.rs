pub mod forecasts;
pub mod health;
pub mod plot;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::config::AppConfig;
use crate::ml::Predictor;
use crate::sources::ObservationSource;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: Arc<dyn Predictor>,
    pub sources: Arc<dyn ObservationSource>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/forecast", get(forecasts::get_forecast))
        .route("/plot", get(plot::get_plot))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use chrono::{Duration, NaiveDate};
    use tower::ServiceExt;

    use crate::ml::ForecastError;
    use crate::models::{DailyCases, DailyWeather, Observations};
    use crate::sources::SourceError;

    struct StubSource {
        fail: bool,
    }

    #[async_trait]
    impl ObservationSource for StubSource {
        async fn fetch(&self) -> Result<Observations, SourceError> {
            if self.fail {
                return Err(SourceError::Request {
                    source_name: "NASA POWER",
                    message: "connection refused".into(),
                });
            }
            let start = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
            let weather = (0..140)
                .map(|i| DailyWeather {
                    date: start + Duration::days(i),
                    t2m: Some(27.0 + (i % 5) as f64),
                    rh2m: Some(80.0),
                    precip: Some((i % 3) as f64),
                    ws2m: Some(1.2),
                })
                .collect();
            let cases = (0..20)
                .map(|w| DailyCases {
                    date: NaiveDate::from_ymd_opt(2025, 5, 25).unwrap() + Duration::weeks(w),
                    cases: Some(30.0 + (w % 4) as f64 * 5.0),
                })
                .collect();
            Ok(Observations { weather, cases })
        }

        fn weather_window(&self) -> (String, String) {
            ("20250519".into(), "20251005".into())
        }
    }

    /// Half of last week's count plus ten.
    struct DampedLag;

    impl Predictor for DampedLag {
        fn feature_names(&self) -> Option<&[String]> {
            None
        }

        fn predict(&self, row: &[f64], names: &[String]) -> Result<f64, ForecastError> {
            let pos = names
                .iter()
                .position(|n| n == "dengue_total_lag1")
                .ok_or_else(|| ForecastError::Prediction("lag1 missing".into()))?;
            Ok(row[pos] * 0.5 + 10.0)
        }
    }

    fn app(fail: bool) -> Router {
        router(AppState {
            config: Arc::new(AppConfig::default()),
            model: Arc::new(DampedLag),
            sources: Arc::new(StubSource { fail }),
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = get_json(app(false), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["weather_start"], "20250519");
        assert_eq!(body["weather_end"], "20251005");
    }

    #[tokio::test]
    async fn test_forecast_endpoint() {
        let (status, body) = get_json(app(false), "/forecast").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast_horizon_weeks"], 4);

        let forecasts = body["forecasts"].as_array().unwrap();
        assert_eq!(forecasts.len(), 4);

        let last: NaiveDate = body["last_data_week"].as_str().unwrap().parse().unwrap();
        let first: NaiveDate = forecasts[0]["date"].as_str().unwrap().parse().unwrap();
        assert_eq!(first, last + Duration::weeks(1));
        assert!(forecasts[0]["predicted_cases"].as_f64().unwrap() > 10.0);
    }

    #[tokio::test]
    async fn test_plot_endpoint() {
        let response = app(false)
            .oneshot(Request::builder().uri("/plot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_source_failure_reported() {
        let (status, body) = get_json(app(true), "/forecast").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");

        let (status, _) = get_json(app(true), "/plot").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
