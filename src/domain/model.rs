use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account role. `Unlimited` accounts bypass admission control entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Unlimited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAccount {
    pub id: String,
    pub role: Role,
    /// Incremented only by the ledger, once per successfully recorded attempt.
    pub usage_count: u64,
    /// Ignored when role is `Unlimited`.
    pub usage_limit: u64,
}

impl ClientAccount {
    pub fn new(id: impl Into<String>, role: Role, usage_limit: u64) -> Self {
        Self {
            id: id.into(),
            role,
            usage_count: 0,
            usage_limit,
        }
    }

    pub fn remaining_quota(&self) -> QuotaStatus {
        match self.role {
            Role::Unlimited => QuotaStatus::Unlimited,
            Role::Standard => {
                QuotaStatus::Remaining(self.usage_limit.saturating_sub(self.usage_count))
            }
        }
    }
}

/// Remaining quota as surfaced in responses: a number, or the literal
/// string "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaStatus {
    Unlimited,
    Remaining(u64),
}

impl Serialize for QuotaStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            QuotaStatus::Unlimited => serializer.serialize_str("unlimited"),
            QuotaStatus::Remaining(n) => serializer.serialize_u64(*n),
        }
    }
}

/// One fully specified property. Field set mirrors the feature columns the
/// compute backend was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub kitchen_area: f64,
    pub bath_area: f64,
    pub other_area: f64,
    pub extra_area: f64,
    pub extra_area_count: u32,
    pub year: i32,
    pub ceil_height: f64,
    pub floor_max: u32,
    pub floor: u32,
    pub total_area: f64,
    pub bath_count: u32,
    pub rooms_count: u32,
    pub gas: bool,
    pub hot_water: bool,
    pub central_heating: bool,
    pub district_name: String,
    pub extra_area_type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// A usable price estimate, either backend-computed or fallback-derived.
/// The `model_version` tag is the only way to tell the two apart and must
/// be preserved end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub predicted_price: f64,
    pub confidence: f64,
    pub confidence_interval: ConfidenceInterval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<HashMap<String, f64>>,
    pub model_version: String,
    pub elapsed_ms: u64,
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    Success(PriceEstimate),
    Failure { reason: String, elapsed_ms: u64 },
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success(_))
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            DispatchResult::Success(estimate) => estimate.elapsed_ms,
            DispatchResult::Failure { elapsed_ms, .. } => *elapsed_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Success,
    Failed,
}

/// Durable record of one prediction attempt. Created exactly once by the
/// ledger, immutable afterwards except for owner deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub account_id: String,
    pub property: PropertyRecord,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<HashMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Transient aggregate of one batch call. Per-item results match input
/// order 1:1; it is never persisted as its own entity.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<DispatchResult>,
    pub successful: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub record_id: u64,
    pub predicted_price: f64,
    pub confidence: f64,
    pub confidence_interval: ConfidenceInterval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<HashMap<String, f64>>,
    pub elapsed_ms: u64,
    pub model_version: String,
    pub remaining_quota: QuotaStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub record_id: u64,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
    pub elapsed_ms: u64,
    pub remaining_quota: QuotaStatus,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    /// 1-based page index.
    pub page: Option<u64>,
    /// Page size, clamped to 1..=100.
    pub limit: Option<u64>,
    pub status: Option<PredictionStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub records: Vec<PredictionRecord>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Aggregate summary over one account's successful predictions.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStats {
    pub total_predictions: u64,
    pub successful: u64,
    pub failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,
}
