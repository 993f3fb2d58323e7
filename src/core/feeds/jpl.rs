use super::{value_as_f64, value_as_string};
use crate::core::http::FeedClient;
use crate::domain::model::{CloseApproach, RiskLevel};
use crate::domain::ports::Feed;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub const AU_KM: f64 = 149_597_870.7;
pub const LUNAR_DISTANCE_KM: f64 = 384_400.0;
/// 缺少絕對星等時採用的預設值
const DEFAULT_H: f64 = 25.0;

/// `{count, fields, data}`: each data row is aligned with `fields`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CadResponse {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

/// Diameter estimate in metres from absolute magnitude H (albedo ≈ 0.14).
pub fn diameter_from_h(h: f64) -> f64 {
    if h > 0.0 {
        1_329_000.0 / 10f64.powf(0.2 * h)
    } else {
        0.0
    }
}

pub fn risk_level(diameter_m: f64, distance_km: f64, neo_alert_ld: f64) -> RiskLevel {
    let ld = distance_km / LUNAR_DISTANCE_KM;
    let mut score = 0;
    if diameter_m > 25.0 && ld < 20.0 {
        score += 1;
    }
    if diameter_m > 140.0 {
        score += 1;
    }
    if ld < 5.0 {
        score += 1;
    }
    if ld < 1.0 {
        score += 2;
    }
    if ld <= neo_alert_ld {
        score += 1;
    }

    match score {
        s if s >= 4 => RiskLevel::High,
        s if s >= 2 => RiskLevel::Moderate,
        s if s > 0 => RiskLevel::Low,
        _ => RiskLevel::None,
    }
}

pub fn parse_close_approaches(response: &CadResponse, neo_alert_ld: f64) -> Vec<CloseApproach> {
    let column = |name: &str| response.fields.iter().position(|f| f == name);
    let (Some(des), Some(cd), Some(dist)) = (column("des"), column("cd"), column("dist")) else {
        return Vec::new();
    };
    let h = column("h");

    response
        .data
        .iter()
        .filter_map(|row| {
            let designation = row.get(des).and_then(value_as_string)?;
            let distance_km = row.get(dist).and_then(value_as_f64)? * AU_KM;
            let magnitude = h
                .and_then(|i| row.get(i))
                .and_then(value_as_f64)
                .unwrap_or(DEFAULT_H);
            let diameter_m = diameter_from_h(magnitude);

            Some(CloseApproach {
                approach_date: row.get(cd).and_then(value_as_string).unwrap_or_default(),
                risk: risk_level(diameter_m, distance_km, neo_alert_ld),
                designation,
                distance_km,
                diameter_m,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitalSummary {
    pub closest: Option<(String, f64)>,
    pub largest: Option<(String, f64)>,
    pub high_risk: usize,
}

pub fn summarize(approaches: &[CloseApproach]) -> OrbitalSummary {
    let closest = approaches
        .iter()
        .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
        .map(|a| (a.designation.clone(), a.distance_km));
    let largest = approaches
        .iter()
        .filter(|a| a.diameter_m > 0.0)
        .max_by(|a, b| a.diameter_m.total_cmp(&b.diameter_m))
        .map(|a| (a.designation.clone(), a.diameter_m));

    OrbitalSummary {
        closest,
        largest,
        high_risk: approaches.iter().filter(|a| a.risk == RiskLevel::High).count(),
    }
}

#[derive(Debug, Clone)]
pub struct CloseApproachFeed {
    client: FeedClient,
    url: String,
    neo_alert_ld: f64,
}

impl CloseApproachFeed {
    pub fn new(client: FeedClient, url: &str, neo_alert_ld: f64) -> Self {
        Self {
            client,
            url: url.to_string(),
            neo_alert_ld,
        }
    }
}

#[async_trait]
impl Feed for CloseApproachFeed {
    type Output = Vec<CloseApproach>;

    fn name(&self) -> &'static str {
        "jpl-cad"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let query = [
            ("dist-max", "20LD".to_string()),
            ("date-max", "60".to_string()),
            ("sort", "dist".to_string()),
        ];
        let response: CadResponse = self.client.get_json(&self.url, &query).await?;
        Ok(parse_close_approaches(&response, self.neo_alert_ld))
    }
}
