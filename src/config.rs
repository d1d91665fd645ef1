use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub cases: CasesConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_model_path() -> String {
    "models/xgb_dengue.json".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub url: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// First day of the weather window, `YYYYMMDD`.
    #[serde(default = "default_weather_start")]
    pub start: String,
    #[serde(default = "default_weather_parameters")]
    pub parameters: String,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Offset used to decide which Sunday closes the weather window.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

fn default_weather_url() -> String {
    "https://power.larc.nasa.gov/api/temporal/daily/point".into()
}
fn default_latitude() -> f64 {
    3.0728
}
fn default_longitude() -> f64 {
    101.4235
}
fn default_weather_start() -> String {
    "20250519".into()
}
fn default_weather_parameters() -> String {
    "T2M,RH2M,PRECTOTCORR,WS2M".into()
}
fn default_community() -> String {
    "RE".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_utc_offset() -> i32 {
    8
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            url: default_weather_url(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            start: default_weather_start(),
            parameters: default_weather_parameters(),
            community: default_community(),
            timeout_secs: default_timeout(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

impl WeatherConfig {
    /// Most recent Sunday (today included) in the configured local offset.
    pub fn window_end(&self) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        let today = Utc::now().with_timezone(&offset).date_naive();
        last_sunday(today)
    }

    pub fn window_end_param(&self) -> String {
        self.window_end().format("%Y%m%d").to_string()
    }
}

pub fn last_sunday(today: NaiveDate) -> NaiveDate {
    let days_since_sunday = today.weekday().num_days_from_sunday() as i64;
    today - Duration::days(days_since_sunday)
}

#[derive(Debug, Deserialize, Clone)]
pub struct CasesConfig {
    /// CSV export of the weekly case spreadsheet.
    #[serde(default = "default_cases_url")]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_cases_url() -> String {
    "https://docs.google.com/spreadsheets/d/1KlsXDWymnydc4lIloxBuQLuLuLvhgDugIevo2_s5xoU/export?format=csv"
        .into()
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            url: default_cases_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Knobs shared by the feature constructor and the forecast engine.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ForecastConfig {
    #[serde(default = "default_horizon")]
    pub horizon_weeks: usize,
    #[serde(default = "default_rolling_windows")]
    pub rolling_windows: Vec<usize>,
    /// Windows that also carry a `roll_std_{w}` feature.
    #[serde(default = "default_std_windows")]
    pub std_windows: Vec<usize>,
    #[serde(default = "default_max_lag")]
    pub max_lag: usize,
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_horizon() -> usize {
    4
}
fn default_rolling_windows() -> Vec<usize> {
    vec![2, 3]
}
fn default_std_windows() -> Vec<usize> {
    vec![2]
}
fn default_max_lag() -> usize {
    2
}
fn default_target() -> String {
    "dengue_total".into()
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon_weeks: default_horizon(),
            rolling_windows: default_rolling_windows(),
            std_windows: default_std_windows(),
            max_lag: default_max_lag(),
            target: default_target(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("DENGUE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("forecast.rolling_windows")
                    .with_list_parse_key("forecast.std_windows")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        if app_config.forecast.horizon_weeks == 0 {
            anyhow::bail!("forecast.horizon_weeks must be at least 1");
        }
        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_sunday() {
        let sunday = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();
        assert_eq!(last_sunday(sunday), sunday);

        let wednesday = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();
        assert_eq!(last_sunday(wednesday), sunday);

        let saturday = NaiveDate::from_ymd_opt(2025, 9, 13).unwrap();
        assert_eq!(last_sunday(saturday), sunday);
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = config::Config::builder().build().unwrap();
        let app: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(app.server.port, 5000);
        assert_eq!(app.forecast.horizon_weeks, 4);
        assert_eq!(app.forecast.rolling_windows, vec![2, 3]);
        assert_eq!(app.model.path, "models/xgb_dengue.json");
    }
}
