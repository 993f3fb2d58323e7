use crate::app::state::AppState;
use crate::domain::model::RiskLevel;
use chrono::{DateTime, Utc};

const SEISMIC_ALERT_TAGS: [&str; 4] = ["high_anomaly", "critical_anomaly", "tsunami_risk", "slbm_anomaly"];

/// Plain-text situation report over the four monitored domains.
pub fn generate(state: &AppState, now: DateTime<Utc>) -> String {
    let mut report = vec![
        format!("{} STRATEGIC SITUATION REPORT {}", "*".repeat(20), "*".repeat(20)),
        format!("Generated: {}", now.format("%Y-%m-%d %H:%M:%S UTC")),
        "=".repeat(67),
        String::new(),
    ];

    report.push("1. SEISMIC DOMAIN:".to_string());
    let seismic: Vec<String> = state
        .seismic_log
        .iter()
        .filter(|a| SEISMIC_ALERT_TAGS.contains(&a.classification.tag()))
        .map(|a| {
            format!(
                "   - ALERT: {} (Mag {:.1}) detected at {} UTC. {}",
                a.status(),
                a.event.magnitude,
                a.event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                a.event.place
            )
        })
        .collect();
    if seismic.is_empty() {
        report.push("   - No high-level alerts active.".to_string());
    } else {
        report.extend(seismic);
    }

    report.push(String::new());
    report.push("2. SOLAR DOMAIN:".to_string());
    let weather = &state.space_weather;
    match (weather.m_flare_probability, weather.x_flare_probability) {
        (Some(m), Some(x)) => {
            report.push(format!("   - Flare probability (24h) -> M class: {}%, X class: {}%", m, x));
            let eta = state.cmes.next_arrival().unwrap_or("N/A");
            report.push(format!(
                "   - Earth-bound CMEs: {} | Next ETA: {}",
                state.cmes.count(),
                eta
            ));
        }
        _ => report.push("   - Solar data not yet loaded.".to_string()),
    }
    if let Some(kp) = weather.kp_index {
        report.push(format!("   - Kp index: {}", kp));
    }
    if let (Some(speed), Some(density)) = (weather.solar_wind_speed, weather.solar_wind_density) {
        report.push(format!(
            "   - Solar wind: {:.0} km/s, {:.1} p/cm3",
            speed, density
        ));
    }

    report.push(String::new());
    report.push("3. ORBITAL DOMAIN:".to_string());
    let orbital: Vec<String> = state
        .close_approaches
        .iter()
        .filter(|a| a.risk == RiskLevel::High)
        .map(|a| {
            format!(
                "   - HIGH-RISK ALERT: Object '{}' approaching on {} ({:.0} km, ~{:.0} m).",
                a.designation, a.approach_date, a.distance_km, a.diameter_m
            )
        })
        .collect();
    if orbital.is_empty() {
        report.push("   - No high-risk orbital threat detected.".to_string());
    } else {
        report.extend(orbital);
    }

    report.push(String::new());
    report.push("4. DISASTER DOMAIN (GDACS):".to_string());
    let disasters: Vec<String> = state
        .disasters
        .iter()
        .filter(|d| d.is_severe())
        .map(|d| {
            format!(
                "   - ALERT {}: {} in {}.",
                d.alert_level.to_uppercase(),
                d.event_type,
                d.country
            )
        })
        .collect();
    if disasters.is_empty() {
        report.push("   - No orange or red GDACS alerts active.".to_string());
    } else {
        report.extend(disasters);
    }

    report.push(String::new());
    report.push(format!("{} END OF REPORT {}", "*".repeat(30), "*".repeat(30)));
    report.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feeds::noaa::{FlareProbability, SolarWindSample};
    use crate::domain::model::{
        Classification, CloseApproach, DisasterAlert, EventAssessment, SeismicEvent,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 11, 18, 0, 0).unwrap()
    }

    fn assessment(magnitude: f64, classification: Classification) -> EventAssessment {
        EventAssessment {
            event: SeismicEvent {
                id: format!("ev{}", magnitude),
                latitude: 41.3,
                longitude: 129.1,
                depth_km: 0.0,
                magnitude,
                timestamp: Utc.with_ymd_and_hms(2024, 5, 11, 12, 30, 0).unwrap(),
                place: "Punggye-ri".to_string(),
                source_url: None,
            },
            anomaly_score: -0.2,
            tsunami_probability: 0.0,
            is_tsunami_risk: false,
            zone: None,
            classification,
            estimated_yield: None,
            impact_radius_km: 2f64.powf(magnitude),
        }
    }

    #[test]
    fn test_empty_state_report() {
        let report = generate(&AppState::new(false), now());
        assert!(report.contains("Generated: 2024-05-11 18:00:00 UTC"));
        assert!(report.contains("No high-level alerts active."));
        assert!(report.contains("Solar data not yet loaded."));
        assert!(report.contains("No high-risk orbital threat detected."));
        assert!(report.contains("No orange or red GDACS alerts active."));
        assert!(report.ends_with("END OF REPORT ******************************"));
    }

    #[test]
    fn test_report_lists_only_alerting_items() {
        let mut state = AppState::new(false);
        state.seismic_log.push(assessment(2.1, Classification::LowAnomaly));
        state
            .seismic_log
            .push(assessment(4.3, Classification::Critical("NK test site".to_string())));

        state.apply_flare_probability(FlareProbability { m_class: 85, x_class: 40 }, now());
        state.apply_solar_wind(
            Some(SolarWindSample { speed_km_s: 812.4, density_p_cc: 12.5 }),
            now(),
        );
        state.close_approaches.push(CloseApproach {
            designation: "99942".to_string(),
            approach_date: "2029-Apr-13 21:46".to_string(),
            distance_km: 38_000.0,
            diameter_m: 370.0,
            risk: RiskLevel::High,
        });
        state.disasters.push(DisasterAlert {
            published: "Fri, 11 Mar 2011 05:46:23 GMT".to_string(),
            event_type: "EQ".to_string(),
            country: "Japan".to_string(),
            alert_level: "Orange".to_string(),
            link: String::new(),
            latitude: None,
            longitude: None,
        });

        let report = generate(&state, now());
        assert!(report.contains("ALERT: CRITICAL (NK test site) (Mag 4.3) detected at 2024-05-11 12:30:00 UTC."));
        assert!(!report.contains("Mag 2.1"));
        assert!(report.contains("M class: 85%, X class: 40%"));
        assert!(report.contains("Earth-bound CMEs: 0 | Next ETA: N/A"));
        assert!(report.contains("Solar wind: 812 km/s, 12.5 p/cm3"));
        assert!(report.contains("Object '99942' approaching on 2029-Apr-13 21:46"));
        assert!(report.contains("ALERT ORANGE: EQ in Japan."));
    }
}
