use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ml::ForecastError;
use crate::sources::SourceError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiError {
                code: "INTERNAL_ERROR".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            body: ApiError {
                code: "UPSTREAM_DATA_ERROR".into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn service_unavailable(service: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ApiError {
                code: "SERVICE_UNAVAILABLE".into(),
                message: format!("{service} is currently unavailable"),
                details: None,
            },
        }
    }

    pub fn forecast_failed(msg: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ApiError {
                code: "FORECAST_FAILED".into(),
                message: msg.into(),
                details: Some(details),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        tracing::error!("Source error: {:?}", err);
        match err {
            SourceError::Request { source_name, .. } => Self::service_unavailable(source_name),
            other => Self::bad_gateway(other.to_string()),
        }
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        tracing::error!("Forecast error: {:?}", err);
        match &err {
            ForecastError::SchemaMismatch { expected, found } => Self::forecast_failed(
                err.to_string(),
                serde_json::json!({ "expected": expected, "found": found }),
            ),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        tracing::error!("Chart rendering error: {:?}", err);
        Self::internal("Failed to render chart")
    }
}
