//! Public data feeds. Each module pairs a stateless `Feed` with pure parse
//! functions so the parsing can be tested without a network.

pub mod donki;
pub mod gdacs;
pub mod jpl;
pub mod noaa;
pub mod usgs;

use serde_json::Value;

/// 數值欄位可能是數字或字串 (JPL 與 NOAA 都以字串回傳)
pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(crate) fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!("2.33")), Some(2.33));
        assert_eq!(value_as_f64(&json!(4)), Some(4.0));
        assert_eq!(value_as_f64(&json!("Kp")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_f64(&json!("NaN")), None);
    }
}
