// Adapters layer: concrete implementations for external systems (the HTTP
// compute backend, ledger storage).

pub mod http_backend;
pub mod store;

pub use http_backend::HttpPriceBackend;
pub use store::LocalStorage;
