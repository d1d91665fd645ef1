/// Builds the model's training-time feature table from the weekly series.
/// Rolling statistics here and in the forecast loop share `window_stats`, so
/// synthetic rows are computed the same way as historical ones.

use crate::config::ForecastConfig;
use crate::models::WeeklyRecord;

use super::schema::{FeatureFrame, WEEK_OF_YEAR};
use chrono::Datelike;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub max: f64,
    pub min: f64,
    /// Population standard deviation (divides by n).
    pub std: f64,
}

/// Max, min and population std of `window`. `None` for an empty window.
pub fn window_stats(window: &[f64]) -> Option<WindowStats> {
    if window.is_empty() {
        return None;
    }

    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let max = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = window.iter().copied().fold(f64::INFINITY, f64::min);

    Some(WindowStats {
        max,
        min,
        std: variance.sqrt(),
    })
}

#[derive(Debug, Clone, Copy)]
enum WeatherVar {
    T2m,
    Ws2m,
    Precip,
}

impl WeatherVar {
    fn read(&self, record: &WeeklyRecord) -> Option<f64> {
        match self {
            Self::T2m => record.t2m,
            Self::Ws2m => record.ws2m,
            Self::Precip => record.precip,
        }
    }
}

/// Mean of `variable` over `span` weeks, starting `shift` weeks back.
struct ExogenousLag {
    name: &'static str,
    variable: WeatherVar,
    shift: usize,
    span: usize,
}

const EXOGENOUS: [ExogenousLag; 6] = [
    ExogenousLag { name: "T2M_1w_lag", variable: WeatherVar::T2m, shift: 1, span: 1 },
    ExogenousLag { name: "T2M_5w_lag", variable: WeatherVar::T2m, shift: 5, span: 1 },
    ExogenousLag { name: "ws2m_3w_lag", variable: WeatherVar::Ws2m, shift: 3, span: 1 },
    ExogenousLag { name: "precip_4w_lag", variable: WeatherVar::Precip, shift: 4, span: 1 },
    ExogenousLag { name: "precip_6w_lag", variable: WeatherVar::Precip, shift: 6, span: 1 },
    ExogenousLag { name: "precip_mean_8_shift_2", variable: WeatherVar::Precip, shift: 8, span: 2 },
];

impl ExogenousLag {
    fn value(&self, weeks: &[WeeklyRecord], t: usize) -> Option<f64> {
        let mut sum = 0.0;
        for j in 0..self.span {
            let back = self.shift + j;
            let idx = t.checked_sub(back)?;
            sum += self.variable.read(&weeks[idx])?;
        }
        Some(sum / self.span as f64)
    }
}

/// Column layout produced by [`construct_features`]: target first, then lags,
/// calendar, weather, and rolling statistics.
pub fn feature_columns(config: &ForecastConfig) -> Vec<String> {
    let mut columns = vec![config.target.clone()];
    columns.extend((1..=config.max_lag).map(|k| format!("{}_lag{k}", config.target)));
    columns.push(WEEK_OF_YEAR.to_string());
    columns.extend(EXOGENOUS.iter().map(|e| e.name.to_string()));
    for w in &config.rolling_windows {
        columns.push(format!("roll_max_{w}"));
        columns.push(format!("roll_min_{w}"));
        if config.std_windows.contains(w) {
            columns.push(format!("roll_std_{w}"));
        }
    }
    columns
}

/// Derive one feature row per week. Weeks with any missing input are dropped.
pub fn construct_features(weeks: &[WeeklyRecord], config: &ForecastConfig) -> FeatureFrame {
    let mut frame = FeatureFrame::new(config.target.clone(), feature_columns(config));

    for t in 0..weeks.len() {
        if let Some(values) = build_row(weeks, t, config) {
            frame.push(weeks[t].week_ending, values);
        }
    }

    tracing::debug!(
        weeks = weeks.len(),
        rows = frame.len(),
        "Constructed feature table"
    );
    frame
}

fn build_row(weeks: &[WeeklyRecord], t: usize, config: &ForecastConfig) -> Option<Vec<f64>> {
    let target_at = |back: usize| -> Option<f64> {
        let idx = t.checked_sub(back)?;
        weeks[idx].cases
    };

    let mut values = Vec::with_capacity(config.max_lag + EXOGENOUS.len() + 8);
    values.push(target_at(0)?);
    for k in 1..=config.max_lag {
        values.push(target_at(k)?);
    }
    values.push(weeks[t].week_ending.iso_week().week() as f64);
    for exo in &EXOGENOUS {
        values.push(exo.value(weeks, t)?);
    }
    for &w in &config.rolling_windows {
        // oldest to newest, ending at the current week
        let window = (0..w).rev().map(target_at).collect::<Option<Vec<f64>>>()?;
        let stats = window_stats(&window)?;
        values.push(stats.max);
        values.push(stats.min);
        if config.std_windows.contains(&w) {
            values.push(stats.std);
        }
    }

    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn weeks(n: usize) -> Vec<WeeklyRecord> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
        (0..n)
            .map(|i| WeeklyRecord {
                week_ending: start + Duration::weeks(i as i64),
                t2m: Some(27.0 + i as f64),
                rh2m: Some(80.0),
                precip: Some(10.0 * i as f64),
                ws2m: Some(1.0 + 0.1 * i as f64),
                cases: Some(100.0 + i as f64 * 5.0),
            })
            .collect()
    }

    #[test]
    fn test_window_stats_population_std() {
        let stats = window_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(stats.std, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.min, 2.0);

        let flat = window_stats(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(flat.std, 0.0);
        assert!(window_stats(&[]).is_none());
    }

    #[test]
    fn test_column_layout() {
        let columns = feature_columns(&ForecastConfig::default());
        assert_eq!(
            columns,
            vec![
                "dengue_total",
                "dengue_total_lag1",
                "dengue_total_lag2",
                "weekofyear",
                "T2M_1w_lag",
                "T2M_5w_lag",
                "ws2m_3w_lag",
                "precip_4w_lag",
                "precip_6w_lag",
                "precip_mean_8_shift_2",
                "roll_max_2",
                "roll_min_2",
                "roll_std_2",
                "roll_max_3",
                "roll_min_3",
            ]
        );
    }

    #[test]
    fn test_leading_weeks_dropped() {
        // precip_mean_8_shift_2 needs nine weeks of history
        let frame = construct_features(&weeks(12), &ForecastConfig::default());
        assert_eq!(frame.len(), 3);
        assert_eq!(
            frame.rows[0].date,
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap() + Duration::weeks(9)
        );
    }

    #[test]
    fn test_row_values() {
        let data = weeks(12);
        let frame = construct_features(&data, &ForecastConfig::default());
        let last = frame.last().unwrap();
        let get = |name: &str| last.values[frame.column(name).unwrap()];

        // t = 11
        assert_eq!(get("dengue_total"), 155.0);
        assert_eq!(get("dengue_total_lag1"), 150.0);
        assert_eq!(get("dengue_total_lag2"), 145.0);
        assert_eq!(get("T2M_5w_lag"), 33.0);
        assert_eq!(get("precip_4w_lag"), 70.0);
        assert_eq!(get("precip_mean_8_shift_2"), 25.0);
        assert_eq!(get("roll_max_3"), 155.0);
        assert_eq!(get("roll_min_3"), 145.0);
        assert_relative_eq!(get("roll_std_2"), 2.5);
        assert_eq!(get("weekofyear"), 12.0);
    }

    #[test]
    fn test_missing_case_drops_dependent_rows() {
        let mut data = weeks(14);
        data[10].cases = None;
        let frame = construct_features(&data, &ForecastConfig::default());
        // weeks 10, 11 (lag1/roll), 12 (lag2/roll_3) all need week 10
        let dates: Vec<_> = frame.rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![data[9].week_ending, data[13].week_ending]);
    }
}
