use crate::core::classifier::Thresholds;
use crate::core::geofence::{default_risk_zones, RiskZone};
use crate::core::http::DEFAULT_TIMEOUT_SECONDS;
use crate::utils::error::{Result, SentinelError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub sources: SourcesConfig,
    pub models: ModelsConfig,
    pub thresholds: Thresholds,
    pub polling: PollingConfig,
    pub output: OutputConfig,
    pub monitoring: MonitoringConfig,
    pub risk_zones: Vec<RiskZone>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// 目錄下需有 all_hour / all_day 的 geojson
    pub usgs_summary_url: String,
    pub usgs_query_url: String,
    pub donki_base_url: String,
    pub nasa_api_key: String,
    pub noaa_flare_probability_url: String,
    pub noaa_kp_url: String,
    pub noaa_solar_wind_url: String,
    pub jpl_cad_url: String,
    pub gdacs_rss_url: String,
    pub timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            usgs_summary_url: "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary".to_string(),
            usgs_query_url: "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string(),
            donki_base_url: "https://api.nasa.gov/DONKI".to_string(),
            nasa_api_key: "DEMO_KEY".to_string(),
            noaa_flare_probability_url:
                "https://services.swpc.noaa.gov/json/goes/primary/flare-fp-7-day.json".to_string(),
            noaa_kp_url: "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json"
                .to_string(),
            noaa_solar_wind_url:
                "https://services.swpc.noaa.gov/products/solar-wind/plasma-1-minute.json".to_string(),
            jpl_cad_url: "https://ssd-api.jpl.nasa.gov/cad.api".to_string(),
            gdacs_rss_url: "https://www.gdacs.org/rss.aspx".to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub anomaly_model_path: String,
    pub tsunami_model_path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            anomaly_model_path: "anomaly_detector_model.json".to_string(),
            tsunami_model_path: "tsunami_predictor_model.json".to_string(),
        }
    }
}

/// Polling periods in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub seismic_seconds: u64,
    pub seismic_advanced_seconds: u64,
    pub solar_seconds: u64,
    pub kp_seconds: u64,
    pub solar_wind_seconds: u64,
    pub asteroid_seconds: u64,
    pub disaster_seconds: u64,
    pub advanced: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            seismic_seconds: 60,
            seismic_advanced_seconds: 15,
            solar_seconds: 30 * 60,
            kp_seconds: 5 * 60,
            solar_wind_seconds: 60,
            asteroid_seconds: 60 * 60,
            disaster_seconds: 30 * 60,
            advanced: false,
        }
    }
}

impl PollingConfig {
    pub fn seismic_period(&self) -> u64 {
        if self.advanced {
            self.seismic_advanced_seconds
        } else {
            self.seismic_seconds
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub bundle_filename: String,
    /// 每次輪詢後是否自動匯出
    pub export_every_cycle: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            bundle_filename: "geo_sentinel_snapshot.zip".to_string(),
            export_every_cycle: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_format: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_format: "compact".to_string(),
        }
    }
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            models: ModelsConfig::default(),
            thresholds: Thresholds::default(),
            polling: PollingConfig::default(),
            output: OutputConfig::default(),
            monitoring: MonitoringConfig::default(),
            risk_zones: default_risk_zones(),
        }
    }
}

impl SentinelConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SentinelError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SentinelError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NASA_API_KEY})，未設定者保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SentinelError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 未替換的 `${VAR}` 改用 NASA 的示範金鑰
    pub fn nasa_api_key(&self) -> &str {
        let key = self.sources.nasa_api_key.trim();
        if key.is_empty() || key.starts_with("${") {
            "DEMO_KEY"
        } else {
            key
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        let sources = &self.sources;
        for (field, url) in [
            ("sources.usgs_summary_url", &sources.usgs_summary_url),
            ("sources.usgs_query_url", &sources.usgs_query_url),
            ("sources.donki_base_url", &sources.donki_base_url),
            ("sources.noaa_flare_probability_url", &sources.noaa_flare_probability_url),
            ("sources.noaa_kp_url", &sources.noaa_kp_url),
            ("sources.noaa_solar_wind_url", &sources.noaa_solar_wind_url),
            ("sources.jpl_cad_url", &sources.jpl_cad_url),
            ("sources.gdacs_rss_url", &sources.gdacs_rss_url),
        ] {
            validation::validate_url(field, url)?;
        }
        validation::validate_positive_number("sources.timeout_seconds", sources.timeout_seconds, 1)?;

        validation::validate_path("models.anomaly_model_path", &self.models.anomaly_model_path)?;
        validation::validate_path("models.tsunami_model_path", &self.models.tsunami_model_path)?;
        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_non_empty_string("output.bundle_filename", &self.output.bundle_filename)?;

        let t = &self.thresholds;
        validation::validate_range("thresholds.anomaly_alert", t.anomaly_alert, -1.0, 1.0)?;
        validation::validate_range("thresholds.strategic_anomaly", t.strategic_anomaly, -1.0, 1.0)?;
        validation::validate_range("thresholds.seismic_magnitude", t.seismic_magnitude, 0.0, 10.0)?;
        validation::validate_range("thresholds.seismic_depth_km", t.seismic_depth_km, 0.0, 800.0)?;
        validation::validate_range("thresholds.tsunami_probability", t.tsunami_probability, 0.0, 1.0)?;
        validation::validate_range("thresholds.tsunami_magnitude", t.tsunami_magnitude, 0.0, 10.0)?;
        validation::validate_range("thresholds.kp_index", t.kp_index, 0, 9)?;
        validation::validate_range("thresholds.cme_speed_km_s", t.cme_speed_km_s, 0.0, 5000.0)?;
        validation::validate_range("thresholds.neo_distance_ld", t.neo_distance_ld, 0.0, 100.0)?;

        let p = &self.polling;
        for (field, seconds) in [
            ("polling.seismic_seconds", p.seismic_seconds),
            ("polling.seismic_advanced_seconds", p.seismic_advanced_seconds),
            ("polling.solar_seconds", p.solar_seconds),
            ("polling.kp_seconds", p.kp_seconds),
            ("polling.solar_wind_seconds", p.solar_wind_seconds),
            ("polling.asteroid_seconds", p.asteroid_seconds),
            ("polling.disaster_seconds", p.disaster_seconds),
        ] {
            validation::validate_positive_number(field, seconds, 1)?;
        }

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.monitoring.log_format.as_str()) {
            return Err(SentinelError::InvalidConfigValueError {
                field: "monitoring.log_format".to_string(),
                value: self.monitoring.log_format.clone(),
                reason: format!("Unsupported format. Valid formats: {}", valid_formats.join(", ")),
            });
        }

        for (i, zone) in self.risk_zones.iter().enumerate() {
            validation::validate_non_empty_string(&format!("risk_zones[{}].name", i), &zone.name)?;
            validation::validate_polygon(&format!("risk_zones[{}].vertices", i), &zone.vertices)?;
        }

        Ok(())
    }

    pub fn output_path(&self) -> &str {
        &self.output.path
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }
}

impl Validate for SentinelConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geofence::ZoneKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SentinelConfig::from_toml_str("").unwrap();

        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.polling.seismic_period(), 60);
        assert_eq!(config.risk_zones.len(), 4);
        assert_eq!(config.nasa_api_key(), "DEMO_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[thresholds]
kp_index = 7
seismic_magnitude = 5.5

[polling]
advanced = true
seismic_advanced_seconds = 10

[output]
path = "./snapshots"

[monitoring]
enabled = true
log_format = "json"

[[risk_zones]]
name = "Test polygon"
kind = "slbm"
vertices = [[10.0, 10.0], [10.0, 20.0], [0.0, 20.0], [0.0, 10.0]]
"#;

        let config = SentinelConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.thresholds.kp_index, 7);
        assert_eq!(config.thresholds.seismic_magnitude, 5.5);
        // 其他門檻維持預設
        assert_eq!(config.thresholds.tsunami_probability, 0.70);
        assert_eq!(config.polling.seismic_period(), 10);
        assert_eq!(config.output_path(), "./snapshots");
        assert!(config.monitoring_enabled());
        assert_eq!(config.risk_zones.len(), 1);
        assert_eq!(config.risk_zones[0].kind, ZoneKind::Slbm);
        assert!(config.risk_zones[0].contains(5.0, 15.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEO_SENTINEL_TEST_KEY", "abc123");

        let toml_content = r#"
[sources]
nasa_api_key = "${GEO_SENTINEL_TEST_KEY}"
"#;
        let config = SentinelConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.nasa_api_key(), "abc123");

        std::env::remove_var("GEO_SENTINEL_TEST_KEY");
    }

    #[test]
    fn test_unset_env_var_falls_back_to_demo_key() {
        let toml_content = r#"
[sources]
nasa_api_key = "${GEO_SENTINEL_UNSET_VARIABLE}"
"#;
        let config = SentinelConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.sources.nasa_api_key, "${GEO_SENTINEL_UNSET_VARIABLE}");
        assert_eq!(config.nasa_api_key(), "DEMO_KEY");
    }

    #[test]
    fn test_config_validation() {
        let invalid_url = SentinelConfig::from_toml_str(
            r#"
[sources]
gdacs_rss_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(invalid_url.validate().is_err());

        let mut config = SentinelConfig::default();
        config.thresholds.tsunami_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = SentinelConfig::default();
        config.polling.kp_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = SentinelConfig::default();
        config.monitoring.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = SentinelConfig::default();
        config.risk_zones = vec![RiskZone::new("line", ZoneKind::TestSite, &[(0.0, 0.0), (1.0, 1.0)])];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SentinelConfig::from_toml_str("[thresholds\nkp_index = 5").unwrap_err();
        assert!(matches!(err, SentinelError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[models]\nanomaly_model_path = \"models/anomaly.json\"\n")
            .unwrap();

        let config = SentinelConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.models.anomaly_model_path, "models/anomaly.json");
        assert_eq!(config.models.tsunami_model_path, "tsunami_predictor_model.json");
    }
}
