use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一筆地震事件，讀入後僅存在記憶體中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
    pub timestamp: DateTime<Utc>,
    pub place: String,
    pub source_url: Option<String>,
}

impl SeismicEvent {
    pub fn fallback_place(latitude: f64, longitude: f64) -> String {
        format!("Coordinates: {:.2}, {:.2}", latitude, longitude)
    }
}

/// Outcome of the seismic decision rule, ordered from least to most severe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "zone", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Normal,
    NormalWithTsunamiWatch,
    LowAnomaly,
    StrategicAnomaly,
    Critical(String),
    SlbmLaunch(String),
}

impl Classification {
    pub fn is_anomalous(&self) -> bool {
        matches!(
            self,
            Self::LowAnomaly | Self::StrategicAnomaly | Self::Critical(_) | Self::SlbmLaunch(_)
        )
    }

    /// LOW_ANOMALY 與 NORMAL 不發出警報
    pub fn raises_alert(&self) -> bool {
        !matches!(self, Self::Normal | Self::LowAnomaly)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::NormalWithTsunamiWatch => "tsunami_risk",
            Self::LowAnomaly => "low_anomaly",
            Self::StrategicAnomaly => "high_anomaly",
            Self::Critical(_) => "critical_anomaly",
            Self::SlbmLaunch(_) => "slbm_anomaly",
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Normal => "Normal".to_string(),
            Self::NormalWithTsunamiWatch => "Normal (TSUNAMI RISK)".to_string(),
            Self::LowAnomaly => "Low Anomaly".to_string(),
            Self::StrategicAnomaly => "Strategic Anomaly (Artificial Signature)".to_string(),
            Self::Critical(zone) => format!("CRITICAL ({})", zone),
            Self::SlbmLaunch(zone) => format!("ANOMALY ({})", zone),
        }
    }

    pub fn alert_title(&self) -> Option<&'static str> {
        match self {
            Self::NormalWithTsunamiWatch => Some("TSUNAMI ALERT"),
            Self::StrategicAnomaly => Some("Security Alert"),
            Self::Critical(_) => Some("CRITICAL GEOPOLITICAL ALERT"),
            Self::SlbmLaunch(_) => Some("Potential Launch Alert"),
            Self::Normal | Self::LowAnomaly => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAssessment {
    pub event: SeismicEvent,
    pub anomaly_score: f64,
    pub tsunami_probability: f64,
    pub is_tsunami_risk: bool,
    pub zone: Option<String>,
    pub classification: Classification,
    pub estimated_yield: Option<String>,
    pub impact_radius_km: f64,
}

impl EventAssessment {
    pub fn status(&self) -> String {
        self.classification.label()
    }

    pub fn alert_message(&self) -> Option<String> {
        let message = match &self.classification {
            Classification::NormalWithTsunamiWatch => {
                "An earthquake with strong tsunamigenic potential was detected.".to_string()
            }
            Classification::StrategicAnomaly => {
                "A strongly anomalous seismic signature was detected, potentially artificial."
                    .to_string()
            }
            Classification::Critical(zone) => {
                format!("Strong anomaly detected INSIDE a high-risk zone: {}!", zone)
            }
            Classification::SlbmLaunch(zone) => format!(
                "Anomalous signature detected in a known SLBM test area: {}!",
                zone
            ),
            Classification::Normal | Classification::LowAnomaly => return None,
        };

        let mut text = format!("{}\nPlace: {}", message, self.event.place);
        if let Some(yield_text) = &self.estimated_yield {
            text.push_str(&format!("\nEstimated yield: {}", yield_text));
        }
        Some(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlareRecord {
    pub flr_id: Option<String>,
    pub begin_time: String,
    pub peak_time: Option<String>,
    pub end_time: Option<String>,
    pub class_type: String,
    pub source_location: Option<String>,
    pub active_region_num: Option<i64>,
    pub link: Option<String>,
    pub geoeffective: bool,
}

impl FlareRecord {
    /// M / X 級且朝向地球的閃焰
    pub fn is_threat(&self) -> bool {
        self.geoeffective && (self.class_type.starts_with('X') || self.class_type.starts_with('M'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StormRisk {
    None,
    G1,
    G2,
    G3,
    G4,
    G5,
}

impl StormRisk {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::G1 => "G1 (Minor)",
            Self::G2 => "G2 (Moderate)",
            Self::G3 => "G3 (Strong)",
            Self::G4 => "G4 (Severe)",
            Self::G5 => "G5 (Extreme)",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::None => "normal",
            Self::G1 | Self::G2 => "G1-G2",
            Self::G3 | Self::G4 | Self::G5 => "G3+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmeRecord {
    pub analysis_id: Option<String>,
    pub start_time: String,
    pub arrival_time: String,
    pub speed_km_s: f64,
    pub is_impactor: bool,
    pub kp_forecast: Option<f64>,
    pub link: Option<String>,
    pub storm_risk: StormRisk,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceWeather {
    pub m_flare_probability: Option<u32>,
    pub x_flare_probability: Option<u32>,
    pub kp_index: Option<u32>,
    pub solar_wind_speed: Option<f64>,
    pub solar_wind_density: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    None,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseApproach {
    pub designation: String,
    pub approach_date: String,
    pub distance_km: f64,
    pub diameter_m: f64,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterAlert {
    pub published: String,
    pub event_type: String,
    pub country: String,
    pub alert_level: String,
    pub link: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DisasterAlert {
    pub fn is_severe(&self) -> bool {
        matches!(self.alert_level.as_str(), "Orange" | "Red")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSource {
    Seismic,
    Geomagnetic,
    Orbital,
    Disaster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub source: AlertSource,
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// 一張表格：CSV 匯出的單位
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_low_anomaly_and_normal_are_silent() {
        assert!(!Classification::Normal.raises_alert());
        assert!(!Classification::LowAnomaly.raises_alert());
        assert!(Classification::NormalWithTsunamiWatch.raises_alert());
        assert!(Classification::StrategicAnomaly.raises_alert());
        assert!(Classification::Critical("zone".into()).raises_alert());
        assert!(Classification::SlbmLaunch("zone".into()).raises_alert());
    }

    #[test]
    fn test_classification_tags() {
        assert_eq!(Classification::StrategicAnomaly.tag(), "high_anomaly");
        assert_eq!(Classification::SlbmLaunch("x".into()).tag(), "slbm_anomaly");
        assert_eq!(
            Classification::Critical("NK test site".into()).label(),
            "CRITICAL (NK test site)"
        );
    }

    #[test]
    fn test_flare_threat_requires_geoeffective_m_or_x() {
        let mut flare = FlareRecord {
            flr_id: None,
            begin_time: "2024-05-10T06:27Z".to_string(),
            peak_time: None,
            end_time: None,
            class_type: "X1.2".to_string(),
            source_location: Some("S17W30".to_string()),
            active_region_num: Some(13664),
            link: None,
            geoeffective: true,
        };
        assert!(flare.is_threat());

        flare.class_type = "C4.0".to_string();
        assert!(!flare.is_threat());

        flare.class_type = "M2.0".to_string();
        flare.geoeffective = false;
        assert!(!flare.is_threat());
    }
}
