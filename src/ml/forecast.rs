/// Recursive multi-step forecasting.
///
/// Each prediction is fed back as a surrogate observation: target lags shift,
/// rolling statistics are recomputed from the lag history, and the calendar
/// week advances. Weather features keep their last known values for the whole
/// horizon.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::config::ForecastConfig;

use super::features::{window_stats, WindowStats};
use super::schema::{FeatureFrame, FeatureKind, FeatureRow, FeatureSchema};
use super::{ForecastError, Predictor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Date of the last real feature row.
    pub last_known: NaiveDate,
    pub points: Vec<ForecastPoint>,
}

/// Snapshot of the loop between two predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastState {
    row: FeatureRow,
    /// Target values, most recent first.
    recent: VecDeque<f64>,
    capacity: usize,
}

impl ForecastState {
    /// Seed the lag history from the last row of `history`.
    pub fn init(schema: Arc<FeatureSchema>, history: &FeatureFrame) -> Result<Self, ForecastError> {
        let last = history.len().checked_sub(1).ok_or(ForecastError::EmptyHistory)?;
        let row = schema.project(history, last)?;

        let lags = schema.lag_fields();
        let mut recent: VecDeque<f64> = if lags.is_empty() {
            // nothing to seed from but the raw target series
            history.target_history().into()
        } else {
            lags.iter().map(|(pos, _)| row.values()[*pos]).collect()
        };

        let windows = schema.rolling_windows();
        let max_window = windows.last().copied().unwrap_or(recent.len());
        let capacity = max_window.max(schema.max_lag());

        // short history: repeat the oldest value until the widest window fits
        match recent.back().copied() {
            Some(oldest) if recent.len() < capacity => recent.resize(capacity, oldest),
            None if capacity > 0 => return Err(ForecastError::EmptyHistory),
            _ => {}
        }

        Ok(Self {
            row,
            recent,
            capacity,
        })
    }

    pub fn row(&self) -> &FeatureRow {
        &self.row
    }

    pub fn recent(&self) -> &VecDeque<f64> {
        &self.recent
    }

    /// State after observing `prediction` for the current row's next week.
    pub fn advance(&self, prediction: f64) -> Result<Self, ForecastError> {
        let mut recent = self.recent.clone();
        recent.push_front(prediction);
        recent.truncate(self.capacity);

        let (head, tail) = recent.as_slices();
        let ordered: Vec<f64> = head.iter().chain(tail).copied().collect();

        let schema = Arc::clone(self.row.schema());
        let values = schema
            .fields()
            .iter()
            .zip(self.row.values())
            .map(|(field, &current)| match field.kind {
                FeatureKind::TargetLag(k) => ordered
                    .get(k - 1)
                    .or_else(|| ordered.last())
                    .copied()
                    .unwrap_or(current),
                FeatureKind::RollingMax(w) => rolling(&ordered, w).map_or(current, |s| s.max),
                FeatureKind::RollingMin(w) => rolling(&ordered, w).map_or(current, |s| s.min),
                FeatureKind::RollingStd(w) => rolling(&ordered, w).map_or(current, |s| s.std),
                FeatureKind::WeekOfYear => next_week_of_year(current),
                FeatureKind::Exogenous => current,
            })
            .collect();

        let row = FeatureRow::new(schema, self.row.date + Duration::weeks(1), values)?;
        Ok(Self {
            row,
            recent,
            capacity: self.capacity,
        })
    }
}

fn rolling(recent: &[f64], w: usize) -> Option<WindowStats> {
    window_stats(&recent[..w.min(recent.len())])
}

/// 52 rolls over to 1. ISO years with 53 weeks are not special-cased.
pub fn next_week_of_year(week: f64) -> f64 {
    ((week as i64).rem_euclid(52) + 1) as f64
}

/// Schema the model was trained with, falling back to the history's columns.
pub fn resolve_schema(
    model: &dyn Predictor,
    history: &FeatureFrame,
) -> Result<FeatureSchema, ForecastError> {
    match model.feature_names() {
        Some(names) => FeatureSchema::from_names(&history.target, names.iter().cloned()),
        None => FeatureSchema::from_frame(history),
    }
}

/// Forecast `config.horizon_weeks` weeks past the last row of `history`.
pub fn multi_step_forecast(
    model: &dyn Predictor,
    history: &FeatureFrame,
    config: &ForecastConfig,
) -> Result<Forecast, ForecastError> {
    let schema = Arc::new(resolve_schema(model, history)?);
    let mut state = ForecastState::init(Arc::clone(&schema), history)?;
    let last_known = state.row().date;

    let mut points = Vec::with_capacity(config.horizon_weeks);
    for h in 1..=config.horizon_weeks {
        schema.validate(state.row())?;
        let value = model.predict(state.row().values(), schema.names())?;
        points.push(ForecastPoint {
            date: last_known + Duration::weeks(h as i64),
            value,
        });
        state = state.advance(value)?;
    }

    tracing::debug!(
        %last_known,
        horizon = config.horizon_weeks,
        schema_version = schema.version,
        "Generated multi-step forecast"
    );

    Ok(Forecast { last_known, points })
}
