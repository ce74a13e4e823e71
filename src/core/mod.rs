pub mod admission;
pub mod batch;
pub mod dispatcher;
pub mod engine;
pub mod fallback;
pub mod ledger;

pub use crate::domain::model::{
    BatchOutcome, ClientAccount, DispatchResult, PredictionRecord, PropertyRecord,
};
pub use crate::domain::ports::{PriceBackend, Storage};
pub use crate::utils::error::Result;
