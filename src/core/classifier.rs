use crate::core::geofence::{self, RiskZone};
use crate::domain::model::{Classification, EventAssessment, SeismicEvent};
use crate::domain::ports::{AnomalyScorer, TsunamiPredictor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// anomaly_score below this marks the event anomalous
    pub anomaly_alert: f64,
    /// anomaly_score below this (outside any zone) is a strategic anomaly
    pub strategic_anomaly: f64,
    pub seismic_magnitude: f64,
    pub seismic_depth_km: f64,
    pub tsunami_probability: f64,
    pub tsunami_magnitude: f64,
    pub kp_index: u32,
    pub cme_speed_km_s: f64,
    pub neo_distance_ld: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            anomaly_alert: -0.01,
            strategic_anomaly: -0.1,
            seismic_magnitude: 6.0,
            seismic_depth_km: 50.0,
            tsunami_probability: 0.70,
            tsunami_magnitude: 7.5,
            kp_index: 5,
            cme_speed_km_s: 700.0,
            neo_distance_ld: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationInput {
    pub depth_km: f64,
    pub magnitude: f64,
    pub anomaly_score: f64,
    pub tsunami_probability: f64,
}

pub fn is_tsunami_risk(tsunami_probability: f64, magnitude: f64, thresholds: &Thresholds) -> bool {
    tsunami_probability > thresholds.tsunami_probability && magnitude > thresholds.tsunami_magnitude
}

/// Seismic decision rule. Pure: the zone lookup happens before the call.
pub fn classify(
    input: &ClassificationInput,
    zone: Option<&RiskZone>,
    thresholds: &Thresholds,
) -> Classification {
    let tsunami_risk = is_tsunami_risk(input.tsunami_probability, input.magnitude, thresholds);

    let anomalous = input.anomaly_score < thresholds.anomaly_alert
        || input.magnitude >= thresholds.seismic_magnitude
        || input.depth_km <= thresholds.seismic_depth_km;

    if anomalous {
        return match zone {
            Some(zone) if zone.is_slbm() => Classification::SlbmLaunch(zone.name.clone()),
            Some(zone) => Classification::Critical(zone.name.clone()),
            None if input.anomaly_score < thresholds.strategic_anomaly => {
                Classification::StrategicAnomaly
            }
            None => Classification::LowAnomaly,
        };
    }

    if tsunami_risk {
        Classification::NormalWithTsunamiWatch
    } else {
        Classification::Normal
    }
}

/// 以規模估算等效 TNT 當量
pub fn estimate_yield(magnitude: f64) -> String {
    let kilotons = 10f64.powf(1.25 * magnitude - 5.5);
    if !kilotons.is_finite() {
        return "N/A".to_string();
    }
    if kilotons < 1.0 {
        format!("~{:.0} tonnes", kilotons * 1000.0)
    } else {
        format!("~{:.1} kilotonnes", kilotons)
    }
}

pub fn impact_radius_km(magnitude: f64) -> f64 {
    2f64.powf(magnitude)
}

/// Runs both models and the geofence over one event.
pub fn assess(
    event: SeismicEvent,
    scorer: &dyn AnomalyScorer,
    predictor: &dyn TsunamiPredictor,
    zones: &[RiskZone],
    thresholds: &Thresholds,
) -> EventAssessment {
    let anomaly_score = scorer.anomaly_score(event.depth_km, event.magnitude);
    let tsunami_probability = predictor.tsunami_probability(event.depth_km, event.magnitude);
    let zone = geofence::locate(zones, event.latitude, event.longitude);

    let input = ClassificationInput {
        depth_km: event.depth_km,
        magnitude: event.magnitude,
        anomaly_score,
        tsunami_probability,
    };
    let classification = classify(&input, zone, thresholds);

    let estimated_yield = classification
        .is_anomalous()
        .then(|| estimate_yield(event.magnitude));

    tracing::debug!(
        "Assessed {} (M{:.1}, {:.1} km): score={:.4}, tsunami={:.2} -> {:?}",
        event.id,
        event.magnitude,
        event.depth_km,
        anomaly_score,
        tsunami_probability,
        classification
    );

    EventAssessment {
        impact_radius_km: impact_radius_km(event.magnitude),
        is_tsunami_risk: is_tsunami_risk(tsunami_probability, event.magnitude, thresholds),
        zone: zone.map(|z| z.name.clone()),
        anomaly_score,
        tsunami_probability,
        classification,
        estimated_yield,
        event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geofence::{default_risk_zones, ZoneKind};
    use chrono::{TimeZone, Utc};

    fn input(depth_km: f64, magnitude: f64, anomaly_score: f64, tsunami: f64) -> ClassificationInput {
        ClassificationInput {
            depth_km,
            magnitude,
            anomaly_score,
            tsunami_probability: tsunami,
        }
    }

    fn strict() -> Thresholds {
        // 關閉規模與深度條件，只看模型分數
        Thresholds {
            seismic_magnitude: 10.0,
            seismic_depth_km: -1.0,
            ..Thresholds::default()
        }
    }

    #[test]
    fn test_normal_event() {
        let result = classify(&input(35.0, 4.2, 0.08, 0.01), None, &strict());
        assert_eq!(result, Classification::Normal);
    }

    #[test]
    fn test_low_and_strategic_anomaly() {
        let t = strict();
        assert_eq!(
            classify(&input(35.0, 4.2, -0.05, 0.0), None, &t),
            Classification::LowAnomaly
        );
        assert_eq!(
            classify(&input(35.0, 4.2, -0.15, 0.0), None, &t),
            Classification::StrategicAnomaly
        );
        // 邊界值：-0.1 不算 strategic，-0.01 不算 anomalous
        assert_eq!(
            classify(&input(35.0, 4.2, -0.1, 0.0), None, &t),
            Classification::LowAnomaly
        );
        assert_eq!(
            classify(&input(35.0, 4.2, -0.01, 0.0), None, &t),
            Classification::Normal
        );
    }

    #[test]
    fn test_zone_escalation() {
        let zones = default_risk_zones();
        let t = strict();

        let critical = classify(&input(1.0, 5.1, -0.02, 0.0), Some(&zones[0]), &t);
        assert_eq!(critical, Classification::Critical("NK test site".to_string()));

        let slbm = classify(&input(1.0, 5.1, -0.02, 0.0), Some(&zones[2]), &t);
        assert_eq!(
            slbm,
            Classification::SlbmLaunch("SLBM test area (Sea of Japan)".to_string())
        );

        // 區域升級優先於 strategic 判斷
        let strong = classify(&input(1.0, 5.1, -0.5, 0.0), Some(&zones[0]), &t);
        assert!(matches!(strong, Classification::Critical(_)));
    }

    #[test]
    fn test_zone_without_anomaly_stays_normal() {
        let zones = default_risk_zones();
        let result = classify(&input(10.0, 4.0, 0.05, 0.0), Some(&zones[0]), &strict());
        assert_eq!(result, Classification::Normal);
    }

    #[test]
    fn test_magnitude_and_depth_thresholds_trigger_anomaly() {
        let t = Thresholds::default();
        assert_eq!(
            classify(&input(300.0, 6.0, 0.1, 0.0), None, &t),
            Classification::LowAnomaly
        );
        assert_eq!(
            classify(&input(50.0, 4.0, 0.1, 0.0), None, &t),
            Classification::LowAnomaly
        );
        assert_eq!(
            classify(&input(50.1, 5.9, 0.1, 0.0), None, &t),
            Classification::Normal
        );
    }

    #[test]
    fn test_tsunami_watch() {
        let t = strict();
        assert_eq!(
            classify(&input(20.0, 7.8, 0.05, 0.85), None, &t),
            Classification::NormalWithTsunamiWatch
        );
        // 兩個條件都必須嚴格大於門檻
        assert_eq!(
            classify(&input(20.0, 7.5, 0.05, 0.85), None, &t),
            Classification::Normal
        );
        assert_eq!(
            classify(&input(20.0, 7.8, 0.05, 0.70), None, &t),
            Classification::Normal
        );
        // 異常判定優先於海嘯觀察
        assert_eq!(
            classify(&input(20.0, 7.8, -0.2, 0.95), None, &t),
            Classification::StrategicAnomaly
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let zone = RiskZone::new("site", ZoneKind::TestSite, &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let case = input(12.0, 5.5, -0.07, 0.4);
        let first = classify(&case, Some(&zone), &Thresholds::default());
        for _ in 0..10 {
            assert_eq!(classify(&case, Some(&zone), &Thresholds::default()), first);
        }
    }

    #[test]
    fn test_estimate_yield() {
        // M4.0 -> 10^-0.5 kt ≈ 316 t
        assert_eq!(estimate_yield(4.0), "~316 tonnes");
        // M5.0 -> 10^0.75 kt ≈ 5.6 kt
        assert_eq!(estimate_yield(5.0), "~5.6 kilotonnes");
    }

    struct FixedScorer(f64);
    impl AnomalyScorer for FixedScorer {
        fn anomaly_score(&self, _depth_km: f64, _magnitude: f64) -> f64 {
            self.0
        }
    }

    struct FixedPredictor(f64);
    impl TsunamiPredictor for FixedPredictor {
        fn tsunami_probability(&self, _depth_km: f64, _magnitude: f64) -> f64 {
            self.0
        }
    }

    fn event(lat: f64, lon: f64, depth_km: f64, magnitude: f64) -> SeismicEvent {
        SeismicEvent {
            id: "us7000test".to_string(),
            latitude: lat,
            longitude: lon,
            depth_km,
            magnitude,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            place: "somewhere".to_string(),
            source_url: None,
        }
    }

    #[test]
    fn test_assess_inside_nk_site() {
        let assessment = assess(
            event(41.28, 129.08, 0.0, 4.3),
            &FixedScorer(-0.2),
            &FixedPredictor(0.0),
            &default_risk_zones(),
            &strict(),
        );

        assert_eq!(
            assessment.classification,
            Classification::Critical("NK test site".to_string())
        );
        assert_eq!(assessment.zone.as_deref(), Some("NK test site"));
        assert!(assessment.estimated_yield.is_some());
        assert!(assessment.alert_message().unwrap().contains("NK test site"));
    }

    #[test]
    fn test_assess_normal_with_tsunami_probability_in_status() {
        let assessment = assess(
            event(38.3, 142.4, 29.0, 9.1),
            &FixedScorer(0.05),
            &FixedPredictor(0.92),
            &default_risk_zones(),
            &strict(),
        );

        assert_eq!(assessment.classification, Classification::NormalWithTsunamiWatch);
        assert!(assessment.is_tsunami_risk);
        assert!(assessment.estimated_yield.is_none());
        assert_eq!(assessment.status(), "Normal (TSUNAMI RISK)");
    }
}
