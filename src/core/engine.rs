use crate::core::admission::{self, Admission};
use crate::core::batch::{BatchOrchestrator, MAX_BATCH_SIZE};
use crate::core::dispatcher::ComputeDispatcher;
use crate::core::ledger::PredictionLedger;
use crate::domain::model::{
    AccountStats, BatchItemResult, BatchResponse, DispatchResult, HistoryPage, HistoryQuery,
    PredictionRecord, PredictionResponse, PropertyRecord,
};
use crate::domain::ports::{PriceBackend, Storage};
use crate::utils::error::{PredictError, Result};
use crate::utils::validation::Validate;
use std::sync::Arc;
use std::time::Duration;

/// Top-level orchestration: admission gate, dispatch (single or fanned-out),
/// ledger write, response assembly. One engine instance serves any number of
/// concurrent requests.
pub struct PredictionEngine<B: PriceBackend + 'static, S: Storage> {
    dispatcher: Arc<ComputeDispatcher<B>>,
    batch: BatchOrchestrator<B>,
    ledger: Arc<PredictionLedger<S>>,
}

impl<B: PriceBackend + 'static, S: Storage> PredictionEngine<B, S> {
    pub fn new(
        backend: B,
        ledger: PredictionLedger<S>,
        backend_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        let dispatcher = Arc::new(ComputeDispatcher::new(backend, backend_timeout));
        let batch = BatchOrchestrator::new(dispatcher.clone(), concurrency);
        Self {
            dispatcher,
            batch,
            ledger: Arc::new(ledger),
        }
    }

    pub fn ledger(&self) -> &PredictionLedger<S> {
        &self.ledger
    }

    pub async fn predict(
        &self,
        account_id: &str,
        property: PropertyRecord,
    ) -> Result<PredictionResponse> {
        // Request errors resolve at the boundary: no backend call, no ledger
        // write, no quota movement.
        property.validate()?;

        let account = self.ledger.account(account_id).await?;
        if let Admission::Denied { used, limit, .. } = admission::try_admit(&account, 1) {
            tracing::info!(
                "Admission denied for {}: {}/{} used",
                account_id,
                used,
                limit
            );
            return Err(PredictError::quota_exceeded(used, limit));
        }

        let result = self.dispatcher.dispatch(&property).await;
        let record = self.ledger.record(account_id, &property, &result).await?;

        match result {
            DispatchResult::Success(estimate) => {
                tracing::info!(
                    "Prediction {} for {}: {} RUB ({})",
                    record.id,
                    account_id,
                    estimate.predicted_price,
                    estimate.model_version
                );
                let account = self.ledger.account(account_id).await?;
                Ok(PredictionResponse {
                    record_id: record.id,
                    predicted_price: estimate.predicted_price,
                    confidence: estimate.confidence,
                    confidence_interval: estimate.confidence_interval,
                    breakdown: estimate.breakdown,
                    elapsed_ms: estimate.elapsed_ms,
                    model_version: estimate.model_version,
                    remaining_quota: account.remaining_quota(),
                })
            }
            DispatchResult::Failure { reason, .. } => {
                tracing::warn!("Prediction {} for {} failed: {}", record.id, account_id, reason);
                Err(PredictError::PredictionFailed { reason })
            }
        }
    }

    pub async fn predict_batch(
        &self,
        account_id: &str,
        properties: Vec<PropertyRecord>,
    ) -> Result<BatchResponse> {
        // Size gate first: an empty or oversized batch is a request error and
        // must fail before quota is even considered.
        if properties.is_empty() || properties.len() > MAX_BATCH_SIZE {
            return Err(PredictError::BatchSizeError {
                size: properties.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        let account = self.ledger.account(account_id).await?;
        if let Admission::Denied {
            used,
            limit,
            remaining,
        } = admission::try_admit(&account, properties.len() as u64)
        {
            tracing::info!(
                "Batch of {} denied for {}: only {} remaining",
                properties.len(),
                account_id,
                remaining
            );
            return Err(PredictError::quota_exceeded(used, limit));
        }

        let outcome = self.batch.run(properties.clone()).await?;
        let records = self
            .ledger
            .record_batch(account_id, &properties, &outcome.results)
            .await?;

        let results = records
            .iter()
            .zip(&outcome.results)
            .enumerate()
            .map(|(index, (record, result))| match result {
                DispatchResult::Success(estimate) => BatchItemResult {
                    index,
                    record_id: record.id,
                    status: record.status,
                    predicted_price: Some(estimate.predicted_price),
                    model_version: Some(estimate.model_version.clone()),
                    error: None,
                },
                DispatchResult::Failure { reason, .. } => BatchItemResult {
                    index,
                    record_id: record.id,
                    status: record.status,
                    predicted_price: None,
                    model_version: None,
                    error: Some(reason.clone()),
                },
            })
            .collect();

        let account = self.ledger.account(account_id).await?;
        Ok(BatchResponse {
            total: outcome.results.len(),
            successful: outcome.successful,
            failed: outcome.failed,
            results,
            elapsed_ms: outcome.elapsed_ms,
            remaining_quota: account.remaining_quota(),
        })
    }

    pub async fn history(&self, account_id: &str, query: &HistoryQuery) -> Result<HistoryPage> {
        self.ledger.list(account_id, query).await
    }

    pub async fn stats(&self, account_id: &str) -> Result<AccountStats> {
        self.ledger.stats(account_id).await
    }

    pub async fn get_prediction(&self, account_id: &str, record_id: u64) -> Result<PredictionRecord> {
        self.ledger.get(account_id, record_id).await
    }

    pub async fn delete_prediction(&self, account_id: &str, record_id: u64) -> Result<()> {
        self.ledger.delete(account_id, record_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fallback::FALLBACK_MODEL_VERSION;
    use crate::domain::model::{
        ClientAccount, ConfidenceInterval, PredictionStatus, QuotaStatus, Role,
    };
    use crate::domain::ports::{BackendError, BackendPrediction};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Copy)]
    enum Mode {
        Succeed,
        Unavailable,
        Reject,
    }

    struct FixedBackend {
        mode: Mode,
        calls: Arc<AtomicUsize>,
    }

    impl FixedBackend {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PriceBackend for FixedBackend {
        async fn predict(
            &self,
            _record: &PropertyRecord,
        ) -> std::result::Result<BackendPrediction, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Succeed => Ok(BackendPrediction {
                    predicted_price: 15_000_000.0,
                    confidence: 0.99,
                    confidence_interval: ConfidenceInterval {
                        lower: 14_850_000.0,
                        upper: 15_150_000.0,
                    },
                    breakdown: None,
                    model_version: "ensemble-v1".to_string(),
                }),
                Mode::Unavailable => Err(BackendError::Unavailable("down".to_string())),
                Mode::Reject => Err(BackendError::Rejected("bad field".to_string())),
            }
        }
    }

    #[derive(Clone, Default)]
    struct MemStorage {
        files: Arc<std::sync::Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MemStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().unwrap();
            files.get(path).cloned().ok_or_else(|| {
                PredictError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().unwrap();
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn property() -> PropertyRecord {
        PropertyRecord {
            kitchen_area: 10.0,
            bath_area: 5.0,
            other_area: 50.5,
            extra_area: 10.0,
            extra_area_count: 1,
            year: 2015,
            ceil_height: 2.7,
            floor_max: 10,
            floor: 5,
            total_area: 75.5,
            bath_count: 1,
            rooms_count: 3,
            gas: true,
            hot_water: true,
            central_heating: true,
            district_name: "Centralnyj".to_string(),
            extra_area_type_name: "balcony".to_string(),
        }
    }

    async fn engine_with(
        mode: Mode,
        role: Role,
        used: u64,
        limit: u64,
    ) -> PredictionEngine<FixedBackend, MemStorage> {
        let ledger = PredictionLedger::new(MemStorage::default());
        let mut account = ClientAccount::new("acc-1", role, limit);
        account.usage_count = used;
        ledger.upsert_account(account).await.unwrap();

        PredictionEngine::new(
            FixedBackend::new(mode),
            ledger,
            Duration::from_secs(5),
            4,
        )
    }

    #[tokio::test]
    async fn successful_prediction_reports_remaining_quota() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 0, 100).await;

        let response = engine.predict("acc-1", property()).await.unwrap();
        assert_eq!(response.predicted_price, 15_000_000.0);
        assert_eq!(response.model_version, "ensemble-v1");
        assert_eq!(response.remaining_quota, QuotaStatus::Remaining(99));
    }

    #[tokio::test]
    async fn quota_exhaustion_scenario() {
        // usage 99/100: one success fills the quota, the next call is denied
        // with remaining=0.
        let engine = engine_with(Mode::Unavailable, Role::Standard, 99, 100).await;

        let response = engine.predict("acc-1", property()).await.unwrap();
        assert_eq!(response.model_version, FALLBACK_MODEL_VERSION);
        assert_eq!(response.remaining_quota, QuotaStatus::Remaining(0));

        let err = engine.predict("acc-1", property()).await.unwrap_err();
        match err {
            PredictError::QuotaExceeded {
                used,
                limit,
                remaining,
            } => {
                assert_eq!((used, limit, remaining), (100, 100, 0));
            }
            other => panic!("expected quota error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_property_is_never_recorded() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 0, 100).await;

        let mut bad = property();
        bad.ceil_height = 0.5;
        let err = engine.predict("acc-1", bad).await.unwrap_err();
        assert!(matches!(err, PredictError::ValidationError { .. }));

        let page = engine.history("acc-1", &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(
            engine.ledger().account("acc-1").await.unwrap().usage_count,
            0
        );
    }

    #[tokio::test]
    async fn dispatch_failure_is_recorded_but_consumes_nothing() {
        let engine = engine_with(Mode::Reject, Role::Standard, 0, 100).await;

        let err = engine.predict("acc-1", property()).await.unwrap_err();
        assert!(matches!(err, PredictError::PredictionFailed { .. }));

        let page = engine.history("acc-1", &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].status, PredictionStatus::Failed);
        assert_eq!(
            engine.ledger().account("acc-1").await.unwrap().usage_count,
            0
        );
    }

    #[tokio::test]
    async fn batch_over_remaining_quota_is_denied_wholesale() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 95, 100).await;

        let batch: Vec<_> = (0..6).map(|_| property()).collect();
        let err = engine.predict_batch("acc-1", batch).await.unwrap_err();
        assert!(matches!(
            err,
            PredictError::QuotaExceeded { remaining: 5, .. }
        ));

        let page = engine.history("acc-1", &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn oversized_batch_fails_before_quota_and_backend() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 100, 100).await;

        let batch: Vec<_> = (0..101).map(|_| property()).collect();
        let err = engine.predict_batch("acc-1", batch).await.unwrap_err();
        assert!(matches!(
            err,
            PredictError::BatchSizeError { size: 101, max: 100 }
        ));

        let page = engine.history("acc-1", &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(
            engine.ledger().account("acc-1").await.unwrap().usage_count,
            100
        );
    }

    #[tokio::test]
    async fn batch_partial_failure_keeps_order_and_counts() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 0, 100).await;

        let mut batch = vec![property(), property(), property()];
        batch[1].total_area = 2.0; // invalid, becomes a per-item failure

        let response = engine.predict_batch("acc-1", batch).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.successful, 2);
        assert_eq!(response.failed, 1);
        assert_eq!(response.results[1].status, PredictionStatus::Failed);
        assert!(response.results[1].error.as_deref().unwrap().contains("invalid record"));
        assert_eq!(response.results[0].status, PredictionStatus::Success);
        assert_eq!(response.results[2].status, PredictionStatus::Success);
        assert_eq!(response.remaining_quota, QuotaStatus::Remaining(98));

        // All three attempts are in the ledger, failures included.
        let page = engine.history("acc-1", &HistoryQuery::default()).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn unlimited_account_reports_unlimited_quota() {
        let engine = engine_with(Mode::Succeed, Role::Unlimited, 0, 0).await;
        let response = engine.predict("acc-1", property()).await.unwrap();
        assert_eq!(response.remaining_quota, QuotaStatus::Unlimited);
    }

    #[tokio::test]
    async fn delete_and_stats_round_trip() {
        let engine = engine_with(Mode::Succeed, Role::Standard, 0, 100).await;
        let response = engine.predict("acc-1", property()).await.unwrap();

        let stats = engine.stats("acc-1").await.unwrap();
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.average_price, Some(15_000_000.0));

        let fetched = engine.get_prediction("acc-1", response.record_id).await.unwrap();
        assert_eq!(fetched.predicted_price, Some(15_000_000.0));

        engine
            .delete_prediction("acc-1", response.record_id)
            .await
            .unwrap();
        assert!(engine.get_prediction("acc-1", response.record_id).await.is_err());
    }
}
