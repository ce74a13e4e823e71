use crate::domain::model::{ConfidenceInterval, PriceEstimate, PropertyRecord};

/// Model tag for fallback-derived estimates. Callers and the ledger rely on
/// this to tell heuristic prices apart from backend-computed ones; never
/// collapse the distinction.
pub const FALLBACK_MODEL_VERSION: &str = "heuristic-fallback-v1";

/// Rouble per square metre of total area.
const AREA_UNIT_RATE: f64 = 150_000.0;
/// Flat bonus per room.
const ROOM_RATE: f64 = 250_000.0;
/// Flat bonus per floor index.
const FLOOR_RATE: f64 = 15_000.0;

/// Fixed reference year for building age, matching the upper bound the
/// validator accepts for `year`. Using wall-clock time here would break
/// determinism of the estimate.
const REFERENCE_YEAR: i32 = 2025;

/// Conservative half-width of the fallback confidence interval (±15%).
const FALLBACK_MARGIN: f64 = 0.15;
pub const FALLBACK_CONFIDENCE: f64 = 1.0 - FALLBACK_MARGIN;

fn district_multiplier(district: &str) -> f64 {
    match district {
        "Centralnyj" => 1.4,
        "Petrogradskij" => 1.35,
        "Moskovskij" => 1.15,
        "Nevskij" => 1.05,
        "Vyborgskij" => 0.95,
        "Kirovskij" => 0.9,
        "Krasnoselskij" => 0.85,
        _ => 1.0,
    }
}

fn age_discount(year: i32) -> f64 {
    let building_age = REFERENCE_YEAR - year;
    if building_age > 20 {
        0.9
    } else if building_age > 10 {
        0.95
    } else {
        1.0
    }
}

/// Deterministic local estimate used when the backend cannot answer. Pure
/// function of the record and the fixed tables above.
pub fn estimate(record: &PropertyRecord) -> PriceEstimate {
    let base = record.total_area * AREA_UNIT_RATE;
    let room_bonus = f64::from(record.rooms_count) * ROOM_RATE;
    let floor_bonus = f64::from(record.floor) * FLOOR_RATE;

    let multiplier = district_multiplier(&record.district_name);
    let discount = age_discount(record.year);

    let predicted_price = ((base + room_bonus + floor_bonus) * multiplier * discount).round();
    let margin = predicted_price * FALLBACK_MARGIN;

    PriceEstimate {
        predicted_price,
        confidence: FALLBACK_CONFIDENCE,
        confidence_interval: ConfidenceInterval {
            lower: predicted_price - margin,
            upper: predicted_price + margin,
        },
        breakdown: None,
        model_version: FALLBACK_MODEL_VERSION.to_string(),
        elapsed_ms: 0,
    }
}
