use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Accepts a JSON number or a numeric string; anything else is rejected.
pub fn coerce_number(field: &str, value: &Value) -> ApiResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| ApiError::validation(format!("{} must be a number", field)))
}

/// Upper bound for any count field.
pub const MAX_COUNT: i64 = 1_000_000;

/// Whole, non-negative counts such as age or length of stay. Fractions are
/// truncated.
pub fn coerce_count(field: &str, value: &Value) -> ApiResult<i64> {
    let n = coerce_number(field, value)?;
    if n < 0.0 {
        return Err(ApiError::validation(format!("{} cannot be negative", field)));
    }
    if n.trunc() > MAX_COUNT as f64 {
        return Err(ApiError::validation(format!(
            "{} cannot exceed {}",
            field, MAX_COUNT
        )));
    }
    Ok(n.trunc() as i64)
}

/// A readmission risk percentage, either numeric or a string such as
/// `"62.5%"`.
pub fn coerce_risk(value: &Value) -> ApiResult<f64> {
    let normalized = match value {
        Value::String(s) => Value::String(s.trim().trim_end_matches('%').to_string()),
        other => other.clone(),
    };
    let risk = coerce_number("readmissionRisk", &normalized)?;

    if !(0.0..=100.0).contains(&risk) {
        return Err(ApiError::validation(
            "readmissionRisk must be between 0 and 100",
        ));
    }
    Ok(risk)
}

/// Two decimal places, the way risk values are reported to clients.
pub fn format_risk(risk: f64) -> String {
    format!("{:.2}", risk)
}

/// Trimmed, non-empty text or `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
