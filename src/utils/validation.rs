use crate::domain::model::PropertyRecord;
use crate::utils::error::{PredictError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub const VALID_DISTRICTS: [&str; 7] = [
    "Centralnyj",
    "Petrogradskij",
    "Moskovskij",
    "Nevskij",
    "Krasnoselskij",
    "Vyborgskij",
    "Kirovskij",
];

pub const VALID_EXTRA_AREA_TYPES: [&str; 2] = ["balcony", "loggia"];

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(PredictError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(PredictError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(PredictError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_config_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PredictError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PredictError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PredictError::validation(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PredictError::validation(
            field,
            format!("must be a non-negative number, got {}", value),
        ));
    }
    Ok(())
}

/// Validity ranges match what the compute backend itself enforces, so a
/// record that passes here is also acceptable on the wire.
impl Validate for PropertyRecord {
    fn validate(&self) -> Result<()> {
        check_range("total_area", self.total_area, 10.0, 500.0)?;
        check_range("year", self.year, 1800, 2025)?;
        check_range("ceil_height", self.ceil_height, 1.5, 6.0)?;
        check_range("rooms_count", self.rooms_count, 0, 10)?;

        check_non_negative("kitchen_area", self.kitchen_area)?;
        check_non_negative("bath_area", self.bath_area)?;
        check_non_negative("other_area", self.other_area)?;
        check_non_negative("extra_area", self.extra_area)?;

        if self.floor < 1 {
            return Err(PredictError::validation("floor", "must be at least 1"));
        }
        if self.floor > self.floor_max {
            return Err(PredictError::validation(
                "floor",
                format!(
                    "must not exceed floor_max ({} > {})",
                    self.floor, self.floor_max
                ),
            ));
        }

        if !VALID_DISTRICTS.contains(&self.district_name.as_str()) {
            return Err(PredictError::validation(
                "district_name",
                format!("must be one of: {}", VALID_DISTRICTS.join(", ")),
            ));
        }

        if !VALID_EXTRA_AREA_TYPES.contains(&self.extra_area_type_name.as_str()) {
            return Err(PredictError::validation(
                "extra_area_type_name",
                format!("must be one of: {}", VALID_EXTRA_AREA_TYPES.join(", ")),
            ));
        }

        Ok(())
    }
}
