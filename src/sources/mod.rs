pub mod cases;
pub mod weather;
pub mod weekly;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{CasesConfig, WeatherConfig};
use crate::models::Observations;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {source_name} failed: {message}")]
    Request {
        source_name: &'static str,
        message: String,
    },

    #[error("unexpected {source_name} payload: {message}")]
    Payload {
        source_name: &'static str,
        message: String,
    },

    #[error("case sheet must contain 'Total' or 'dengue_total'. Found columns: {0:?}")]
    MissingCaseColumn(Vec<String>),

    #[error("first case row has no date; nothing to extrapolate from")]
    MissingFirstDate,
}

/// Where the raw daily series come from.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    async fn fetch(&self) -> Result<Observations, SourceError>;

    /// `(start, end)` of the weather window, as sent to the API.
    fn weather_window(&self) -> (String, String);
}

/// Live sources: NASA POWER for weather, a published spreadsheet for cases.
pub struct RemoteSources {
    client: reqwest::Client,
    weather: WeatherConfig,
    cases: CasesConfig,
}

impl RemoteSources {
    pub fn new(weather: WeatherConfig, cases: CasesConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            weather,
            cases,
        }
    }
}

#[async_trait]
impl ObservationSource for RemoteSources {
    async fn fetch(&self) -> Result<Observations, SourceError> {
        let (start, end) = self.weather_window();
        let weather = weather::fetch_weather_power(
            &self.client,
            &self.weather,
            &start,
            &end,
            Duration::from_secs(self.weather.timeout_secs),
        )
        .await?;
        let cases = cases::fetch_case_sheet(
            &self.client,
            &self.cases.url,
            Duration::from_secs(self.cases.timeout_secs),
        )
        .await?;

        tracing::info!(
            weather_days = weather.len(),
            case_rows = cases.len(),
            %start,
            %end,
            "Fetched observations"
        );
        Ok(Observations { weather, cases })
    }

    fn weather_window(&self) -> (String, String) {
        (self.weather.start.clone(), self.weather.window_end_param())
    }
}
