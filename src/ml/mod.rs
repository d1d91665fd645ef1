pub mod booster;
pub mod features;
pub mod forecast;
pub mod schema;

use thiserror::Error;

pub use booster::Booster;
pub use forecast::{multi_step_forecast, Forecast, ForecastPoint};
pub use schema::{FeatureFrame, FeatureSchema};

/// Failures raised while building feature rows or stepping the forecast.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("feature schema mismatch: expected {expected:?}, got {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("feature '{0}' is missing from the history table")]
    MissingFeature(String),

    #[error("invalid feature schema: {0}")]
    InvalidSchema(String),

    #[error("feature history is empty")]
    EmptyHistory,

    #[error("model prediction failed: {0}")]
    Prediction(String),
}

/// Anything that maps an ordered feature vector to a single prediction.
///
/// Implementations must accept the feature names in exactly the order the
/// values are given and reject vectors that disagree with their own layout.
pub trait Predictor: Send + Sync {
    /// Feature names recorded alongside the model, if any.
    fn feature_names(&self) -> Option<&[String]>;

    fn predict(&self, row: &[f64], feature_names: &[String]) -> Result<f64, ForecastError>;
}
