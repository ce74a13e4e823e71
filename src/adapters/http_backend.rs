use crate::domain::model::{ConfidenceInterval, PropertyRecord};
use crate::domain::ports::{BackendError, BackendPrediction, PriceBackend};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const PREDICT_PATH: &str = "/api/predict";
const DEFAULT_MODEL_VERSION: &str = "ensemble-v1";

/// Compute backend over HTTP, speaking the Flask model API's wire format
/// (Yes/No utility flags, `/api/predict` endpoint).
pub struct HttpPriceBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPriceBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn predict_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), PREDICT_PATH)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn wire_payload(record: &PropertyRecord) -> serde_json::Value {
    serde_json::json!({
        "kitchen_area": record.kitchen_area,
        "bath_area": record.bath_area,
        "other_area": record.other_area,
        "gas": yes_no(record.gas),
        "hot_water": yes_no(record.hot_water),
        "central_heating": yes_no(record.central_heating),
        "extra_area": record.extra_area,
        "extra_area_count": record.extra_area_count,
        "year": record.year,
        "ceil_height": record.ceil_height,
        "floor_max": record.floor_max,
        "floor": record.floor,
        "total_area": record.total_area,
        "bath_count": record.bath_count,
        "extra_area_type_name": record.extra_area_type_name,
        "district_name": record.district_name,
        "rooms_count": record.rooms_count,
    })
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    predicted_price: f64,
    confidence_interval: Option<WireInterval>,
    breakdown: Option<HashMap<String, f64>>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireInterval {
    lower: f64,
    upper: f64,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: Option<String>,
}

impl WirePrediction {
    fn into_backend_prediction(self) -> BackendPrediction {
        let predicted_price = self.predicted_price;
        let interval = self
            .confidence_interval
            .map(|i| ConfidenceInterval {
                lower: i.lower,
                upper: i.upper,
            })
            .unwrap_or(ConfidenceInterval {
                lower: predicted_price * 0.99,
                upper: predicted_price * 1.01,
            });

        // The backend reports an interval, not a score; derive the score from
        // the interval half-width relative to the price.
        let confidence = if predicted_price > 0.0 {
            let margin = (interval.upper - interval.lower) / 2.0;
            (1.0 - margin / predicted_price).clamp(0.0, 1.0)
        } else {
            0.0
        };

        BackendPrediction {
            predicted_price,
            confidence,
            confidence_interval: interval,
            breakdown: self.breakdown,
            model_version: self
                .model_version
                .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
        }
    }
}

#[async_trait]
impl PriceBackend for HttpPriceBackend {
    async fn predict(
        &self,
        record: &PropertyRecord,
    ) -> std::result::Result<BackendPrediction, BackendError> {
        let url = self.predict_url();
        tracing::debug!("Backend request to {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&wire_payload(record))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!("Backend response status: {}", status);

        if status.is_client_error() {
            let reason = response
                .json::<WireError>()
                .await
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(BackendError::Rejected(reason));
        }

        if !status.is_success() {
            return Err(BackendError::Unavailable(format!("HTTP {}", status)));
        }

        let prediction: WirePrediction = response
            .json()
            .await
            .map_err(|e| BackendError::Unavailable(format!("invalid response body: {}", e)))?;

        Ok(prediction.into_backend_prediction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn record() -> PropertyRecord {
        PropertyRecord {
            kitchen_area: 10.0,
            bath_area: 5.0,
            other_area: 50.5,
            extra_area: 10.0,
            extra_area_count: 1,
            year: 2010,
            ceil_height: 2.7,
            floor_max: 10,
            floor: 5,
            total_area: 65.0,
            bath_count: 1,
            rooms_count: 3,
            gas: true,
            hot_water: false,
            central_heating: true,
            district_name: "Centralnyj".to_string(),
            extra_area_type_name: "balcony".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_prediction_is_parsed() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/predict")
                .json_body_partial(r#"{"gas": "Yes", "hot_water": "No", "district_name": "Centralnyj"}"#);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "predicted_price": 15_276_833.5,
                    "confidence_interval": {"lower": 15_124_065.17, "upper": 15_429_601.84},
                    "currency": "RUB",
                    "status": "success"
                }));
        });

        let backend = HttpPriceBackend::new(server.base_url(), Duration::from_secs(5));
        let prediction = backend.predict(&record()).await.unwrap();

        api_mock.assert();
        assert_eq!(prediction.predicted_price, 15_276_833.5);
        assert_eq!(prediction.model_version, DEFAULT_MODEL_VERSION);
        assert!((prediction.confidence - 0.99).abs() < 1e-6);
    }

    #[tokio::test]
    async fn client_error_maps_to_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/predict");
            then.status(400)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "error": "total_area must be between 10 and 500 m²",
                    "status": "error"
                }));
        });

        let backend = HttpPriceBackend::new(server.base_url(), Duration::from_secs(5));
        let err = backend.predict(&record()).await.unwrap_err();

        match err {
            BackendError::Rejected(reason) => assert!(reason.contains("total_area")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn server_error_maps_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/predict");
            then.status(503);
        });

        let backend = HttpPriceBackend::new(server.base_url(), Duration::from_secs(5));
        let err = backend.predict(&record()).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_unavailable() {
        let backend = HttpPriceBackend::new("http://127.0.0.1:1", Duration::from_secs(2));
        let err = backend.predict(&record()).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Unavailable(_) | BackendError::Timeout
        ));
    }

    #[tokio::test]
    async fn garbage_body_maps_to_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/predict");
            then.status(200).body("not json");
        });

        let backend = HttpPriceBackend::new(server.base_url(), Duration::from_secs(5));
        let err = backend.predict(&record()).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }
}
