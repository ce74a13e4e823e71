use crate::domain::model::{
    AccountStats, ClientAccount, DispatchResult, HistoryPage, HistoryQuery, PredictionRecord,
    PredictionStatus, PropertyRecord, Role,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PredictError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

const LEDGER_FILE: &str = "ledger.json";
const MAX_PAGE_LIMIT: u64 = 100;
const DEFAULT_PAGE_LIMIT: u64 = 20;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    accounts: HashMap<String, ClientAccount>,
    records: Vec<PredictionRecord>,
    next_record_id: u64,
}

/// The system of record: every attempt lands here, and the per-account usage
/// counter moves only inside this type, in the same locked mutation that
/// appends the record. The full state is re-persisted through the Storage
/// port after every mutation; a failed write rolls the mutation back and
/// fails the request.
pub struct PredictionLedger<S: Storage> {
    storage: S,
    state: Mutex<LedgerState>,
}

impl<S: Storage> PredictionLedger<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: Mutex::new(LedgerState {
                next_record_id: 1,
                ..LedgerState::default()
            }),
        }
    }

    /// Restores a previously persisted ledger; starts empty when no snapshot
    /// exists yet.
    pub async fn load(storage: S) -> Result<Self> {
        let state = match storage.read_file(LEDGER_FILE).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(PredictError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                LedgerState {
                    next_record_id: 1,
                    ..LedgerState::default()
                }
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            storage,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &LedgerState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.storage.write_file(LEDGER_FILE, &bytes).await
    }

    pub async fn upsert_account(&self, account: ClientAccount) -> Result<()> {
        let mut state = self.state.lock().await;
        state.accounts.insert(account.id.clone(), account);
        self.persist(&state).await
    }

    pub async fn account(&self, account_id: &str) -> Result<ClientAccount> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(account_id)
            .cloned()
            .ok_or_else(|| PredictError::AccountNotFound {
                id: account_id.to_string(),
            })
    }

    /// Records one attempt. A `Success` result on a quota-bound account also
    /// increments `usage_count` by exactly 1; failures are recorded for audit
    /// but never consume quota.
    pub async fn record(
        &self,
        account_id: &str,
        property: &PropertyRecord,
        result: &DispatchResult,
    ) -> Result<PredictionRecord> {
        let mut state = self.state.lock().await;
        let record = append_record(&mut state, account_id, property, result)?;

        if let Err(e) = self.persist(&state).await {
            rollback_last(&mut state, account_id, result);
            return Err(e);
        }
        Ok(record)
    }

    /// Records a whole batch under one lock and one persist. Counter
    /// increments follow the same per-item rule as `record`.
    pub async fn record_batch(
        &self,
        account_id: &str,
        properties: &[PropertyRecord],
        results: &[DispatchResult],
    ) -> Result<Vec<PredictionRecord>> {
        debug_assert_eq!(properties.len(), results.len());

        let mut state = self.state.lock().await;
        let mut records = Vec::with_capacity(results.len());
        for (property, result) in properties.iter().zip(results) {
            match append_record(&mut state, account_id, property, result) {
                Ok(record) => records.push(record),
                Err(e) => {
                    for result in results.iter().take(records.len()).rev() {
                        rollback_last(&mut state, account_id, result);
                    }
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.persist(&state).await {
            for result in results.iter().rev() {
                rollback_last(&mut state, account_id, result);
            }
            return Err(e);
        }
        Ok(records)
    }

    /// One account's history, newest first.
    pub async fn list(&self, account_id: &str, query: &HistoryQuery) -> Result<HistoryPage> {
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(PredictError::validation("page", "must be at least 1"));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);

        let state = self.state.lock().await;
        if !state.accounts.contains_key(account_id) {
            return Err(PredictError::AccountNotFound {
                id: account_id.to_string(),
            });
        }

        let filtered: Vec<&PredictionRecord> = state
            .records
            .iter()
            .rev()
            .filter(|r| r.account_id == account_id)
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .collect();

        let total = filtered.len() as u64;
        // A page past the end is a valid request and yields an empty page,
        // even for offsets that do not fit in u64.
        let start = (page - 1).saturating_mul(limit);
        let records = filtered
            .into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(HistoryPage {
            records,
            total,
            page,
            limit,
        })
    }

    pub async fn get(&self, account_id: &str, record_id: u64) -> Result<PredictionRecord> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .find(|r| r.id == record_id && r.account_id == account_id)
            .cloned()
            .ok_or(PredictError::RecordNotFound { id: record_id })
    }

    /// Deletes one record, scoped to the owning account. Does not touch the
    /// usage counter: consumed quota stays consumed.
    pub async fn delete(&self, account_id: &str, record_id: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let position = state
            .records
            .iter()
            .position(|r| r.id == record_id && r.account_id == account_id)
            .ok_or(PredictError::RecordNotFound { id: record_id })?;

        let removed = state.records.remove(position);
        if let Err(e) = self.persist(&state).await {
            state.records.insert(position, removed);
            return Err(e);
        }
        Ok(())
    }

    pub async fn stats(&self, account_id: &str) -> Result<AccountStats> {
        let state = self.state.lock().await;
        if !state.accounts.contains_key(account_id) {
            return Err(PredictError::AccountNotFound {
                id: account_id.to_string(),
            });
        }

        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut prices = Vec::new();
        let mut confidences = Vec::new();

        for record in state.records.iter().filter(|r| r.account_id == account_id) {
            match record.status {
                PredictionStatus::Success => {
                    successful += 1;
                    if let Some(price) = record.predicted_price {
                        prices.push(price);
                    }
                    if let Some(confidence) = record.confidence {
                        confidences.push(confidence);
                    }
                }
                PredictionStatus::Failed => failed += 1,
            }
        }

        let average = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        Ok(AccountStats {
            total_predictions: successful + failed,
            successful,
            failed,
            average_price: average(&prices),
            min_price: prices.iter().cloned().fold(None, |min, p| {
                Some(min.map_or(p, |m: f64| m.min(p)))
            }),
            max_price: prices.iter().cloned().fold(None, |max, p| {
                Some(max.map_or(p, |m: f64| m.max(p)))
            }),
            average_confidence: average(&confidences),
        })
    }
}

fn append_record(
    state: &mut LedgerState,
    account_id: &str,
    property: &PropertyRecord,
    result: &DispatchResult,
) -> Result<PredictionRecord> {
    let account = state
        .accounts
        .get_mut(account_id)
        .ok_or_else(|| PredictError::AccountNotFound {
            id: account_id.to_string(),
        })?;

    if result.is_success() && account.role == Role::Standard {
        account.usage_count += 1;
    }

    let id = state.next_record_id;
    state.next_record_id += 1;

    let record = match result {
        DispatchResult::Success(estimate) => PredictionRecord {
            id,
            account_id: account_id.to_string(),
            property: property.clone(),
            status: PredictionStatus::Success,
            predicted_price: Some(estimate.predicted_price),
            confidence: Some(estimate.confidence),
            confidence_interval: Some(estimate.confidence_interval),
            breakdown: estimate.breakdown.clone(),
            model_version: Some(estimate.model_version.clone()),
            error: None,
            elapsed_ms: estimate.elapsed_ms,
            created_at: Utc::now(),
        },
        DispatchResult::Failure { reason, elapsed_ms } => PredictionRecord {
            id,
            account_id: account_id.to_string(),
            property: property.clone(),
            status: PredictionStatus::Failed,
            predicted_price: None,
            confidence: None,
            confidence_interval: None,
            breakdown: None,
            model_version: None,
            error: Some(reason.clone()),
            elapsed_ms: *elapsed_ms,
            created_at: Utc::now(),
        },
    };

    state.records.push(record.clone());
    Ok(record)
}

fn rollback_last(state: &mut LedgerState, account_id: &str, result: &DispatchResult) {
    state.records.pop();
    state.next_record_id -= 1;
    if result.is_success() {
        if let Some(account) = state.accounts.get_mut(account_id) {
            if account.role == Role::Standard {
                account.usage_count = account.usage_count.saturating_sub(1);
            }
        }
    }
}
