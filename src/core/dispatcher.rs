use crate::core::fallback;
use crate::domain::model::{DispatchResult, PriceEstimate, PropertyRecord};
use crate::domain::ports::{BackendError, PriceBackend};
use crate::utils::validation::Validate;
use std::time::{Duration, Instant};

/// Sends one property to the compute backend under a timeout. Backend
/// unavailability is recovered locally via the fallback estimator instead of
/// being surfaced as an error; only a genuinely bad record or an explicit
/// backend rejection produces a `Failure`.
pub struct ComputeDispatcher<B: PriceBackend> {
    backend: B,
    timeout: Duration,
}

impl<B: PriceBackend> ComputeDispatcher<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn dispatch(&self, record: &PropertyRecord) -> DispatchResult {
        let started = Instant::now();

        // A malformed record must not reach the fallback estimator either:
        // the heuristic needs the same fields the backend does.
        if let Err(e) = record.validate() {
            tracing::debug!("Rejecting malformed record before dispatch: {}", e);
            return DispatchResult::Failure {
                reason: format!("invalid record: {}", e),
                elapsed_ms: elapsed_ms(started),
            };
        }

        match tokio::time::timeout(self.timeout, self.backend.predict(record)).await {
            Ok(Ok(prediction)) => {
                tracing::debug!(
                    "Backend prediction: {} ({})",
                    prediction.predicted_price,
                    prediction.model_version
                );
                DispatchResult::Success(PriceEstimate {
                    predicted_price: prediction.predicted_price,
                    confidence: prediction.confidence,
                    confidence_interval: prediction.confidence_interval,
                    breakdown: prediction.breakdown,
                    model_version: prediction.model_version,
                    elapsed_ms: elapsed_ms(started),
                })
            }
            Ok(Err(BackendError::Rejected(reason))) => {
                tracing::warn!("Backend rejected record: {}", reason);
                DispatchResult::Failure {
                    reason: format!("backend rejected record: {}", reason),
                    elapsed_ms: elapsed_ms(started),
                }
            }
            Ok(Err(err)) => {
                tracing::warn!("Backend unavailable ({}), using fallback estimate", err);
                self.fallback_estimate(record, started)
            }
            Err(_) => {
                tracing::warn!(
                    "Backend call exceeded {:?}, using fallback estimate",
                    self.timeout
                );
                self.fallback_estimate(record, started)
            }
        }
    }

    fn fallback_estimate(&self, record: &PropertyRecord, started: Instant) -> DispatchResult {
        let mut estimate = fallback::estimate(record);
        estimate.elapsed_ms = elapsed_ms(started);
        DispatchResult::Success(estimate)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ConfidenceInterval;
    use crate::domain::ports::BackendPrediction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behavior {
        Succeed(f64),
        Unavailable,
        Reject,
        Hang,
    }

    struct ScriptedBackend {
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PriceBackend for ScriptedBackend {
        async fn predict(
            &self,
            _record: &PropertyRecord,
        ) -> std::result::Result<BackendPrediction, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed(price) => Ok(BackendPrediction {
                    predicted_price: price,
                    confidence: 0.99,
                    confidence_interval: ConfidenceInterval {
                        lower: price * 0.99,
                        upper: price * 1.01,
                    },
                    breakdown: None,
                    model_version: "ensemble-v1".to_string(),
                }),
                Behavior::Unavailable => {
                    Err(BackendError::Unavailable("connection refused".to_string()))
                }
                Behavior::Reject => Err(BackendError::Rejected("bad field".to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(BackendError::Timeout)
                }
            }
        }
    }

    fn valid_record() -> PropertyRecord {
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

    #[tokio::test]
    async fn backend_success_passes_through() {
        let dispatcher = ComputeDispatcher::new(
            ScriptedBackend::new(Behavior::Succeed(12_345_678.0)),
            Duration::from_secs(5),
        );

        match dispatcher.dispatch(&valid_record()).await {
            DispatchResult::Success(estimate) => {
                assert_eq!(estimate.predicted_price, 12_345_678.0);
                assert_eq!(estimate.model_version, "ensemble-v1");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unavailable_backend_triggers_tagged_fallback() {
        let dispatcher = ComputeDispatcher::new(
            ScriptedBackend::new(Behavior::Unavailable),
            Duration::from_secs(5),
        );

        match dispatcher.dispatch(&valid_record()).await {
            DispatchResult::Success(estimate) => {
                assert_eq!(estimate.model_version, fallback::FALLBACK_MODEL_VERSION);
                assert_eq!(estimate.confidence, fallback::FALLBACK_CONFIDENCE);
                assert_eq!(
                    estimate.predicted_price,
                    fallback::estimate(&valid_record()).predicted_price
                );
            }
            other => panic!("expected fallback success, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_treated_as_backend_failure() {
        let dispatcher = ComputeDispatcher::new(
            ScriptedBackend::new(Behavior::Hang),
            Duration::from_millis(200),
        );

        match dispatcher.dispatch(&valid_record()).await {
            DispatchResult::Success(estimate) => {
                assert_eq!(estimate.model_version, fallback::FALLBACK_MODEL_VERSION);
            }
            other => panic!("expected fallback success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn backend_rejection_is_a_failure_not_a_fallback() {
        let dispatcher = ComputeDispatcher::new(
            ScriptedBackend::new(Behavior::Reject),
            Duration::from_secs(5),
        );

        match dispatcher.dispatch(&valid_record()).await {
            DispatchResult::Failure { reason, .. } => {
                assert!(reason.contains("backend rejected"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_record_never_reaches_backend_or_fallback() {
        let backend = ScriptedBackend::new(Behavior::Succeed(1.0));
        let calls = backend.calls.clone();
        let dispatcher = ComputeDispatcher::new(backend, Duration::from_secs(5));

        let mut record = valid_record();
        record.total_area = -1.0;

        match dispatcher.dispatch(&record).await {
            DispatchResult::Failure { reason, .. } => {
                assert!(reason.contains("invalid record"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
