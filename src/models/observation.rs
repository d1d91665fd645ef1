use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of NASA POWER readings. `None` marks the API's fill value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub t2m: Option<f64>,
    pub rh2m: Option<f64>,
    pub precip: Option<f64>,
    pub ws2m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCases {
    pub date: NaiveDate,
    pub cases: Option<f64>,
}

/// Weather aggregates and case total for one week, labelled by its Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRecord {
    pub week_ending: NaiveDate,
    pub t2m: Option<f64>,
    pub rh2m: Option<f64>,
    pub precip: Option<f64>,
    pub ws2m: Option<f64>,
    pub cases: Option<f64>,
}

impl WeeklyRecord {
    pub fn empty(week_ending: NaiveDate) -> Self {
        Self {
            week_ending,
            t2m: None,
            rh2m: None,
            precip: None,
            ws2m: None,
            cases: None,
        }
    }
}

/// Everything the pipeline pulls from the outside world for one run.
#[derive(Debug, Clone, Default)]
pub struct Observations {
    pub weather: Vec<DailyWeather>,
    pub cases: Vec<DailyCases>,
}
