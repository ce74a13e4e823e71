use thiserror::Error;

use crate::domain::model::QuotaStatus;

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Validation error: {field}: {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Batch must contain between 1 and {max} properties, got {size}")]
    BatchSizeError { size: usize, max: usize },

    #[error("Quota exceeded: used {used} of {limit} ({remaining} remaining)")]
    QuotaExceeded { used: u64, limit: u64, remaining: u64 },

    #[error("Prediction failed: {reason}")]
    PredictionFailed { reason: String },

    #[error("Account not found: {id}")]
    AccountNotFound { id: String },

    #[error("Prediction record not found: {id}")]
    RecordNotFound { id: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid config value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required config field: {field}")]
    MissingConfigError { field: String },
}

impl PredictError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PredictError::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn quota_exceeded(used: u64, limit: u64) -> Self {
        PredictError::QuotaExceeded {
            used,
            limit,
            remaining: limit.saturating_sub(used),
        }
    }

    /// True when the caller, not the system, caused the error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::ValidationError { .. }
                | PredictError::BatchSizeError { .. }
                | PredictError::QuotaExceeded { .. }
                | PredictError::AccountNotFound { .. }
                | PredictError::RecordNotFound { .. }
        )
    }

    /// Machine-readable error payload for the response boundary. Quota
    /// denials carry used/limit/remaining so clients can render a precise
    /// message.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PredictError::QuotaExceeded {
                used,
                limit,
                remaining,
            } => serde_json::json!({
                "error": "quota_exceeded",
                "message": self.to_string(),
                "used": used,
                "limit": limit,
                "remaining": QuotaStatus::Remaining(*remaining),
            }),
            other => serde_json::json!({
                "error": error_code(other),
                "message": other.to_string(),
            }),
        }
    }
}

fn error_code(err: &PredictError) -> &'static str {
    match err {
        PredictError::ValidationError { .. } => "validation_error",
        PredictError::BatchSizeError { .. } => "batch_size_error",
        PredictError::QuotaExceeded { .. } => "quota_exceeded",
        PredictError::PredictionFailed { .. } => "prediction_failed",
        PredictError::AccountNotFound { .. } => "account_not_found",
        PredictError::RecordNotFound { .. } => "record_not_found",
        PredictError::IoError(_) => "io_error",
        PredictError::SerializationError(_) => "serialization_error",
        PredictError::ConfigError { .. }
        | PredictError::InvalidConfigValueError { .. }
        | PredictError::MissingConfigError { .. } => "config_error",
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
