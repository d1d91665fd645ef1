use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::models::DailyWeather;

use super::SourceError;

const SOURCE: &str = "NASA POWER";

/// Sentinel the POWER API writes for days without data.
const FILL_VALUE: f64 = -999.0;

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: HashMap<String, BTreeMap<String, f64>>,
}

pub async fn fetch_weather_power(
    client: &reqwest::Client,
    config: &WeatherConfig,
    start: &str,
    end: &str,
    timeout: Duration,
) -> Result<Vec<DailyWeather>, SourceError> {
    let request_err = |e: reqwest::Error| SourceError::Request {
        source_name: SOURCE,
        message: e.to_string(),
    };

    let longitude = config.longitude.to_string();
    let latitude = config.latitude.to_string();
    let resp = client
        .get(&config.url)
        .query(&[
            ("parameters", config.parameters.as_str()),
            ("community", config.community.as_str()),
            ("longitude", longitude.as_str()),
            ("latitude", latitude.as_str()),
            ("start", start),
            ("end", end),
            ("format", "JSON"),
        ])
        .timeout(timeout)
        .send()
        .await
        .map_err(request_err)?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        tracing::error!("NASA POWER API error: {} - {}", status, text);
        return Err(SourceError::Request {
            source_name: SOURCE,
            message: format!("status {status}"),
        });
    }

    let body = resp.text().await.map_err(request_err)?;
    parse_power_response(&body)
}

/// Turn a POWER daily-point JSON body into one record per day, oldest first.
pub fn parse_power_response(body: &str) -> Result<Vec<DailyWeather>, SourceError> {
    let payload_err = |message: String| SourceError::Payload {
        source_name: SOURCE,
        message,
    };

    let parsed: PowerResponse =
        serde_json::from_str(body).map_err(|e| payload_err(e.to_string()))?;
    let params = parsed.properties.parameter;

    let t2m = series(&params, "T2M")?;
    let rh2m = series(&params, "RH2M")?;
    let precip = series(&params, "PRECTOTCORR")?;
    let ws2m = series(&params, "WS2M")?;

    let reading = |map: &BTreeMap<String, f64>, key: &str| {
        map.get(key).copied().filter(|v| *v != FILL_VALUE)
    };

    // BTreeMap keeps YYYYMMDD keys in date order
    t2m.keys()
        .map(|key| {
            let date = NaiveDate::parse_from_str(key, "%Y%m%d")
                .map_err(|e| payload_err(format!("bad date '{key}': {e}")))?;
            Ok(DailyWeather {
                date,
                t2m: reading(t2m, key),
                rh2m: reading(rh2m, key),
                precip: reading(precip, key),
                ws2m: reading(ws2m, key),
            })
        })
        .collect()
}

fn series<'a>(
    params: &'a HashMap<String, BTreeMap<String, f64>>,
    name: &str,
) -> Result<&'a BTreeMap<String, f64>, SourceError> {
    params.get(name).ok_or_else(|| SourceError::Payload {
        source_name: SOURCE,
        message: format!("parameter {name} missing"),
    })
}
