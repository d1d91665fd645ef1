//! Versioned feature schema and the row/table types that must conform to it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use super::ForecastError;

/// Bumped whenever the layout rules in [`FeatureKind::classify`] change.
pub const SCHEMA_VERSION: u32 = 1;

pub const WEEK_OF_YEAR: &str = "weekofyear";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    TargetLag(usize),
    RollingMax(usize),
    RollingMin(usize),
    RollingStd(usize),
    WeekOfYear,
    /// Weather lags and aggregates. Never recomputed while forecasting.
    Exogenous,
}

impl FeatureKind {
    pub fn classify(name: &str, target: &str) -> Self {
        if let Some(k) = name
            .strip_prefix(target)
            .and_then(|rest| rest.strip_prefix("_lag"))
            .and_then(parse_order)
        {
            return Self::TargetLag(k);
        }
        if let Some(w) = name.strip_prefix("roll_max_").and_then(parse_order) {
            return Self::RollingMax(w);
        }
        if let Some(w) = name.strip_prefix("roll_min_").and_then(parse_order) {
            return Self::RollingMin(w);
        }
        if let Some(w) = name.strip_prefix("roll_std_").and_then(parse_order) {
            return Self::RollingStd(w);
        }
        if name == WEEK_OF_YEAR {
            return Self::WeekOfYear;
        }
        Self::Exogenous
    }

    pub fn window(&self) -> Option<usize> {
        match self {
            Self::RollingMax(w) | Self::RollingMin(w) | Self::RollingStd(w) => Some(*w),
            _ => None,
        }
    }
}

fn parse_order(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n > 0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureField {
    pub name: String,
    pub kind: FeatureKind,
}

/// Ordered, typed list of the features a model consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    pub version: u32,
    pub target: String,
    fields: Vec<FeatureField>,
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn from_names<I, S>(target: &str, names: I) -> Result<Self, ForecastError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ForecastError::InvalidSchema("no features".into()));
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(names.len());
        for name in &names {
            if name == target || name == "date" {
                return Err(ForecastError::InvalidSchema(format!(
                    "'{name}' cannot be a model input"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ForecastError::InvalidSchema(format!(
                    "duplicate feature '{name}'"
                )));
            }
            fields.push(FeatureField {
                name: name.clone(),
                kind: FeatureKind::classify(name, target),
            });
        }

        Ok(Self {
            version: SCHEMA_VERSION,
            target: target.to_string(),
            fields,
            names,
        })
    }

    /// Schema implied by a history table: every column except the target.
    pub fn from_frame(frame: &FeatureFrame) -> Result<Self, ForecastError> {
        Self::from_names(&frame.target, frame.feature_names())
    }

    pub fn fields(&self) -> &[FeatureField] {
        &self.fields
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `(position, lag order)` of every target lag, ascending by order.
    pub fn lag_fields(&self) -> Vec<(usize, usize)> {
        let mut lags: Vec<(usize, usize)> = self
            .fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match f.kind {
                FeatureKind::TargetLag(k) => Some((i, k)),
                _ => None,
            })
            .collect();
        lags.sort_by_key(|(_, k)| *k);
        lags
    }

    pub fn max_lag(&self) -> usize {
        self.lag_fields().last().map(|(_, k)| *k).unwrap_or(0)
    }

    /// Distinct rolling window sizes, ascending.
    pub fn rolling_windows(&self) -> Vec<usize> {
        let mut windows: Vec<usize> = self.fields.iter().filter_map(|f| f.kind.window()).collect();
        windows.sort_unstable();
        windows.dedup();
        windows
    }

    /// Pull row `index` of `frame` into schema order.
    pub fn project(
        self: &Arc<Self>,
        frame: &FeatureFrame,
        index: usize,
    ) -> Result<FeatureRow, ForecastError> {
        let source = frame.rows.get(index).ok_or(ForecastError::EmptyHistory)?;
        let values = self
            .names
            .iter()
            .map(|name| {
                frame
                    .column(name)
                    .map(|c| source.values[c])
                    .ok_or_else(|| ForecastError::MissingFeature(name.clone()))
            })
            .collect::<Result<Vec<f64>, _>>()?;

        FeatureRow::new(Arc::clone(self), source.date, values)
    }

    pub fn validate(&self, row: &FeatureRow) -> Result<(), ForecastError> {
        if row.schema.names != self.names || row.values.len() != self.names.len() {
            return Err(ForecastError::SchemaMismatch {
                expected: self.names.clone(),
                found: row.schema.names.clone(),
            });
        }
        Ok(())
    }
}

/// One week of features in schema order. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    schema: Arc<FeatureSchema>,
    values: Vec<f64>,
}

impl FeatureRow {
    pub fn new(
        schema: Arc<FeatureSchema>,
        date: NaiveDate,
        values: Vec<f64>,
    ) -> Result<Self, ForecastError> {
        if values.len() != schema.len() {
            return Err(ForecastError::SchemaMismatch {
                expected: schema.names.clone(),
                found: vec![format!("<{} values>", values.len())],
            });
        }
        Ok(Self {
            date,
            schema,
            values,
        })
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameRow {
    pub date: NaiveDate,
    pub values: Vec<f64>,
}

/// Date-ordered feature history, target column included.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub target: String,
    pub columns: Vec<String>,
    pub rows: Vec<FrameRow>,
}

impl FeatureFrame {
    pub fn new(target: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            target: target.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, date: NaiveDate, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(FrameRow { date, values });
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| **c != self.target && c.as_str() != "date")
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Target values, most recent first.
    pub fn target_history(&self) -> Vec<f64> {
        match self.column(&self.target) {
            Some(c) => self.rows.iter().rev().map(|r| r.values[c]).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<&'static str> {
        vec![
            "dengue_total_lag2",
            "dengue_total_lag1",
            "weekofyear",
            "T2M_1w_lag",
            "roll_max_3",
            "roll_min_3",
            "roll_max_2",
            "roll_std_2",
        ]
    }

    #[test]
    fn test_classify_names() {
        assert_eq!(
            FeatureKind::classify("dengue_total_lag12", "dengue_total"),
            FeatureKind::TargetLag(12)
        );
        assert_eq!(
            FeatureKind::classify("roll_std_4", "dengue_total"),
            FeatureKind::RollingStd(4)
        );
        assert_eq!(
            FeatureKind::classify("weekofyear", "dengue_total"),
            FeatureKind::WeekOfYear
        );
        // weather lags use a different naming pattern
        assert_eq!(
            FeatureKind::classify("T2M_1w_lag", "dengue_total"),
            FeatureKind::Exogenous
        );
        assert_eq!(
            FeatureKind::classify("dengue_total_lagx", "dengue_total"),
            FeatureKind::Exogenous
        );
    }

    #[test]
    fn test_lags_sorted_and_windows_parsed() {
        let schema = FeatureSchema::from_names("dengue_total", names()).unwrap();
        assert_eq!(schema.lag_fields(), vec![(1, 1), (0, 2)]);
        assert_eq!(schema.max_lag(), 2);
        assert_eq!(schema.rolling_windows(), vec![2, 3]);
        assert_eq!(schema.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_rejects_target_and_duplicates() {
        assert!(FeatureSchema::from_names("dengue_total", ["dengue_total", "weekofyear"]).is_err());
        assert!(FeatureSchema::from_names("dengue_total", ["weekofyear", "weekofyear"]).is_err());
        assert!(FeatureSchema::from_names("dengue_total", Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_project_reorders_columns() {
        let schema = Arc::new(
            FeatureSchema::from_names("dengue_total", ["weekofyear", "dengue_total_lag1"]).unwrap(),
        );
        let mut frame = FeatureFrame::new(
            "dengue_total",
            vec!["dengue_total".into(), "dengue_total_lag1".into(), "weekofyear".into()],
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        frame.push(date, vec![10.0, 7.0, 9.0]);

        let row = schema.project(&frame, 0).unwrap();
        assert_eq!(row.values(), &[9.0, 7.0]);
        assert_eq!(row.get("dengue_total_lag1"), Some(7.0));
        assert_eq!(row.date, date);
    }

    #[test]
    fn test_project_missing_column() {
        let schema = Arc::new(FeatureSchema::from_names("dengue_total", ["roll_max_2"]).unwrap());
        let mut frame = FeatureFrame::new("dengue_total", vec!["dengue_total".into()]);
        frame.push(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), vec![1.0]);

        let err = schema.project(&frame, 0).unwrap_err();
        assert!(matches!(err, ForecastError::MissingFeature(name) if name == "roll_max_2"));
    }

    #[test]
    fn test_validate_detects_foreign_schema() {
        let a = Arc::new(FeatureSchema::from_names("dengue_total", ["a", "b"]).unwrap());
        let b = Arc::new(FeatureSchema::from_names("dengue_total", ["b", "a"]).unwrap());
        let date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let row = FeatureRow::new(b, date, vec![1.0, 2.0]).unwrap();
        assert!(a.validate(&row).is_err());
        assert!(row.schema().validate(&row).is_ok());
    }
}
