/// Resamples daily weather and case series onto a shared weekly index.
///
/// Bins close on Monday and are labelled by the preceding Sunday, so the week
/// labelled `S` covers Tuesday `S-5` through Monday `S+1`.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{DailyCases, DailyWeather, WeeklyRecord};

/// Sunday label of the Monday-closed bin containing `date`.
pub fn week_label(date: NaiveDate) -> NaiveDate {
    let days_to_monday = (7 - date.weekday().num_days_from_monday() as i64) % 7;
    date + Duration::days(days_to_monday) - Duration::days(1)
}

#[derive(Default)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn add(&mut self, v: Option<f64>) {
        if let Some(v) = v {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

#[derive(Default)]
struct WeatherBin {
    t2m: Mean,
    rh2m: Mean,
    ws2m: Mean,
    precip: f64,
}

/// Every label from `first` to `last` inclusive.
fn labels_between(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let weeks = (last - first).num_weeks();
    (0..=weeks).map(move |i| first + Duration::weeks(i))
}

pub fn daily_to_weekly(weather: &[DailyWeather], cases: &[DailyCases]) -> Vec<WeeklyRecord> {
    let mut weather_bins: BTreeMap<NaiveDate, WeatherBin> = BTreeMap::new();
    for day in weather {
        let bin = weather_bins.entry(week_label(day.date)).or_default();
        bin.t2m.add(day.t2m);
        bin.rh2m.add(day.rh2m);
        bin.ws2m.add(day.ws2m);
        bin.precip += day.precip.unwrap_or(0.0);
    }

    let mut case_bins: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for day in cases {
        *case_bins.entry(week_label(day.date)).or_default() += day.cases.unwrap_or(0.0);
    }

    let mut weeks: BTreeMap<NaiveDate, WeeklyRecord> = BTreeMap::new();

    if let (Some(first), Some(last)) = (weather_bins.keys().next(), weather_bins.keys().next_back()) {
        for label in labels_between(*first, *last) {
            let record = weeks.entry(label).or_insert_with(|| WeeklyRecord::empty(label));
            match weather_bins.get(&label) {
                Some(bin) => {
                    record.t2m = bin.t2m.value();
                    record.rh2m = bin.rh2m.value();
                    record.ws2m = bin.ws2m.value();
                    record.precip = Some(bin.precip);
                }
                // an empty bin sums to zero but has no mean
                None => record.precip = Some(0.0),
            }
        }
    }

    if let (Some(first), Some(last)) = (case_bins.keys().next(), case_bins.keys().next_back()) {
        for label in labels_between(*first, *last) {
            let record = weeks.entry(label).or_insert_with(|| WeeklyRecord::empty(label));
            record.cases = Some(case_bins.get(&label).copied().unwrap_or(0.0));
        }
    }

    weeks.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weather_day(d: NaiveDate, t: f64, p: f64) -> DailyWeather {
        DailyWeather {
            date: d,
            t2m: Some(t),
            rh2m: Some(80.0),
            precip: Some(p),
            ws2m: Some(1.0),
        }
    }

    #[test]
    fn test_week_label() {
        // Monday closes the bin labelled the day before
        assert_eq!(week_label(date(2025, 5, 19)), date(2025, 5, 18));
        // Tuesday opens the next bin
        assert_eq!(week_label(date(2025, 5, 20)), date(2025, 5, 25));
        // Sunday belongs to the bin closing the following day
        assert_eq!(week_label(date(2025, 5, 25)), date(2025, 5, 25));
        assert_eq!(week_label(date(2025, 5, 26)), date(2025, 5, 25));
    }

    #[test]
    fn test_weather_aggregation() {
        let days: Vec<DailyWeather> = (0..7)
            .map(|i| weather_day(date(2025, 5, 20) + Duration::days(i), 26.0 + i as f64, 2.0))
            .collect();
        let weeks = daily_to_weekly(&days, &[]);
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_ending, date(2025, 5, 25));
        assert_eq!(weeks[0].t2m, Some(29.0));
        assert_eq!(weeks[0].precip, Some(14.0));
        assert_eq!(weeks[0].cases, None);
    }

    #[test]
    fn test_gap_weeks_and_outer_join() {
        let weather = vec![
            weather_day(date(2025, 5, 20), 27.0, 1.0),
            weather_day(date(2025, 6, 3), 28.0, 3.0),
        ];
        let cases = vec![
            DailyCases { date: date(2025, 6, 1), cases: Some(40.0) },
            DailyCases { date: date(2025, 6, 15), cases: Some(12.0) },
        ];
        let weeks = daily_to_weekly(&weather, &cases);
        let labels: Vec<_> = weeks.iter().map(|w| w.week_ending).collect();
        assert_eq!(
            labels,
            vec![date(2025, 5, 25), date(2025, 6, 1), date(2025, 6, 8), date(2025, 6, 15)]
        );

        // empty weather week between the two observations
        assert_eq!(weeks[1].t2m, None);
        assert_eq!(weeks[1].precip, Some(0.0));
        assert_eq!(weeks[1].cases, Some(40.0));
        // case series starts later than the weather series
        assert_eq!(weeks[0].cases, None);
        // empty case week sums to zero
        assert_eq!(weeks[2].cases, Some(0.0));
        // weather series ends before the last case week
        assert_eq!(weeks[3].precip, None);
    }
}
