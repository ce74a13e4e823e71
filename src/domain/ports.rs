use crate::domain::model::{ConfidenceInterval, PropertyRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// What the external compute backend reports for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendPrediction {
    pub predicted_price: f64,
    pub confidence: f64,
    pub confidence_interval: ConfidenceInterval,
    pub breakdown: Option<HashMap<String, f64>>,
    pub model_version: String,
}

/// Transport-level failure classification. `Rejected` means the backend
/// examined the record and refused it; everything else is unavailability
/// and is eligible for local fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    Unavailable(String),
    Timeout,
    Rejected(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Unavailable(reason) => write!(f, "backend unavailable: {}", reason),
            BackendError::Timeout => write!(f, "backend timed out"),
            BackendError::Rejected(reason) => write!(f, "backend rejected record: {}", reason),
        }
    }
}

/// The external price-estimation backend as a swappable capability.
#[async_trait]
pub trait PriceBackend: Send + Sync {
    async fn predict(
        &self,
        record: &PropertyRecord,
    ) -> std::result::Result<BackendPrediction, BackendError>;
}

pub trait ConfigProvider: Send + Sync {
    fn backend_endpoint(&self) -> &str;
    fn ledger_path(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn concurrent_requests(&self) -> usize;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
