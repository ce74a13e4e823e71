use crate::core::dispatcher::ComputeDispatcher;
use crate::domain::model::{BatchOutcome, DispatchResult, PropertyRecord};
use crate::domain::ports::PriceBackend;
use crate::utils::error::{PredictError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Hard cap on items per batch call; bounds worst-case latency and backend
/// load from a single request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Fans a list of properties out to the dispatcher with bounded concurrency
/// and joins the results in input order.
pub struct BatchOrchestrator<B: PriceBackend + 'static> {
    dispatcher: Arc<ComputeDispatcher<B>>,
    concurrency: usize,
}

impl<B: PriceBackend + 'static> BatchOrchestrator<B> {
    pub fn new(dispatcher: Arc<ComputeDispatcher<B>>, concurrency: usize) -> Self {
        Self {
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, records: Vec<PropertyRecord>) -> Result<BatchOutcome> {
        if records.is_empty() || records.len() > MAX_BATCH_SIZE {
            return Err(PredictError::BatchSizeError {
                size: records.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        let started = Instant::now();
        let total = records.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        tracing::debug!(
            "Dispatching batch of {} items (concurrency {})",
            total,
            self.concurrency
        );

        let mut handles = Vec::with_capacity(total);
        for record in records {
            let semaphore = semaphore.clone();
            let dispatcher = self.dispatcher.clone();
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return DispatchResult::Failure {
                            reason: "batch cancelled".to_string(),
                            elapsed_ms: 0,
                        }
                    }
                };
                dispatcher.dispatch(&record).await
            }));
        }

        // Awaiting the handles in spawn order keeps results aligned with the
        // input regardless of completion order.
        let mut results = Vec::with_capacity(total);
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => DispatchResult::Failure {
                    reason: format!("dispatch task failed: {}", e),
                    elapsed_ms: 0,
                },
            };
            results.push(result);
        }

        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = total - successful;

        tracing::info!(
            "Batch complete: {} successful, {} failed of {}",
            successful,
            failed,
            total
        );

        Ok(BatchOutcome {
            results,
            successful,
            failed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}
