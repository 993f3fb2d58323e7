use crate::utils::error::{Result, SentinelError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> SentinelError {
    SentinelError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(field_name, url_str, format!("Invalid URL format: {}", e))),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN 也會落在這裡
    if !(value >= min && value <= max) {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// 多邊形至少三個頂點，且座標需在合法經緯度範圍內
pub fn validate_polygon(field_name: &str, vertices: &[(f64, f64)]) -> Result<()> {
    if vertices.len() < 3 {
        return Err(invalid(
            field_name,
            vertices.len(),
            "A polygon needs at least 3 vertices",
        ));
    }

    for (lat, lon) in vertices {
        validate_range(field_name, *lat, -90.0, 90.0)?;
        validate_range(field_name, *lon, -180.0, 180.0)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("sources.usgs_hour", "https://earthquake.usgs.gov").is_ok());
        assert!(validate_url("sources.usgs_hour", "http://localhost:8080/feed").is_ok());
        assert!(validate_url("sources.usgs_hour", "").is_err());
        assert!(validate_url("sources.usgs_hour", "invalid-url").is_err());
        assert!(validate_url("sources.usgs_hour", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("polling.seismic_seconds", 60, 1).is_ok());
        assert!(validate_positive_number("polling.seismic_seconds", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range_rejects_nan() {
        assert!(validate_range("thresholds.tsunami_probability", 0.7, 0.0, 1.0).is_ok());
        assert!(validate_range("thresholds.tsunami_probability", 1.2, 0.0, 1.0).is_err());
        assert!(validate_range("thresholds.tsunami_probability", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_validate_polygon() {
        let square = [(41.4, 129.0), (41.4, 129.2), (41.2, 129.2), (41.2, 129.0)];
        assert!(validate_polygon("risk_zones", &square).is_ok());
        assert!(validate_polygon("risk_zones", &square[..2]).is_err());
        assert!(validate_polygon("risk_zones", &[(95.0, 0.0), (0.0, 1.0), (1.0, 1.0)]).is_err());
    }
}
