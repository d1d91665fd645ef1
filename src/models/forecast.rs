use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyForecast {
    pub date: NaiveDate,
    pub predicted_cases: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub forecast_horizon_weeks: usize,
    pub last_data_week: NaiveDate,
    pub forecasts: Vec<WeeklyForecast>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub weather_start: String,
    pub weather_end: String,
}
