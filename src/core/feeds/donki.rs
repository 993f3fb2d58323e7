use crate::core::http::FeedClient;
use crate::domain::model::{CmeRecord, FlareRecord, StormRisk};
use crate::domain::ports::Feed;
use crate::utils::error::{Result, SentinelError};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;

pub const FLARE_WINDOW_DAYS: i64 = 2;
pub const CME_WINDOW_DAYS: i64 = 7;
/// 日面經度低於此值的閃焰視為朝向地球
pub const GEOEFFECTIVE_LONGITUDE: u32 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFlare {
    #[serde(rename = "flrID")]
    pub flr_id: Option<String>,
    pub begin_time: Option<String>,
    pub peak_time: Option<String>,
    pub end_time: Option<String>,
    pub class_type: Option<String>,
    pub source_location: Option<String>,
    pub active_region_num: Option<i64>,
    pub link: Option<String>,
}

fn location_pattern() -> Result<Regex> {
    Regex::new(r"[EW](\d+)").map_err(|e| SentinelError::ProcessingError {
        message: format!("invalid source location pattern: {}", e),
    })
}

fn is_geoeffective_with(pattern: &Regex, location: Option<&str>) -> bool {
    let Some(location) = location else {
        return false;
    };
    pattern
        .captures(&location.to_uppercase())
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .is_some_and(|longitude| longitude < GEOEFFECTIVE_LONGITUDE)
}

/// "S17W30" → true, "N12E75" → false, missing → false.
pub fn is_geoeffective(location: Option<&str>) -> Result<bool> {
    Ok(is_geoeffective_with(&location_pattern()?, location))
}

/// Newest first, as the log is displayed.
pub fn parse_flares(raw: Vec<RawFlare>) -> Result<Vec<FlareRecord>> {
    let pattern = location_pattern()?;
    Ok(raw
        .into_iter()
        .rev()
        .map(|flare| FlareRecord {
            geoeffective: is_geoeffective_with(&pattern, flare.source_location.as_deref()),
            flr_id: flare.flr_id,
            begin_time: flare.begin_time.unwrap_or_else(|| "N/A".to_string()),
            peak_time: flare.peak_time,
            end_time: flare.end_time,
            class_type: flare.class_type.unwrap_or_else(|| "N/A".to_string()),
            source_location: flare.source_location,
            active_region_num: flare.active_region_num,
            link: flare.link,
        })
        .collect())
}

/// GOES 等級排序鍵：字母級別，再依級別內數值
fn class_rank(class_type: &str) -> Option<(u8, f64)> {
    let mut chars = class_type.trim().chars();
    let letter = match chars.next()?.to_ascii_uppercase() {
        'A' => 0,
        'B' => 1,
        'C' => 2,
        'M' => 3,
        'X' => 4,
        _ => return None,
    };
    let value = chars.as_str().parse::<f64>().unwrap_or(0.0);
    Some((letter, value))
}

pub fn strongest_flare(flares: &[FlareRecord]) -> Option<&FlareRecord> {
    flares
        .iter()
        .filter_map(|f| class_rank(&f.class_type).map(|rank| (rank, f)))
        .max_by(|(a, _), (b, _)| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
        .map(|(_, f)| f)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnlil {
    pub estimated_shock_arrival_time: Option<String>,
    pub speed: Option<f64>,
    #[serde(rename = "kp_forecast")]
    pub kp_forecast: Option<f64>,
    #[serde(rename = "kp_90")]
    pub kp_90: Option<f64>,
}

impl RawEnlil {
    pub fn kp(&self) -> Option<f64> {
        self.kp_forecast.or(self.kp_90)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCmeAnalysis {
    #[serde(rename = "cmeAnalysisID")]
    pub cme_analysis_id: Option<String>,
    #[serde(rename = "associatedCMEID")]
    pub associated_cme_id: Option<String>,
    #[serde(rename = "time21_5")]
    pub time21_5: Option<String>,
    pub speed: Option<f64>,
    pub is_most_accurate: Option<bool>,
    pub is_impactor: Option<bool>,
    pub link: Option<String>,
    pub enlil: Option<RawEnlil>,
    #[serde(default)]
    pub enlil_list: Vec<RawEnlil>,
}

impl RawCmeAnalysis {
    /// 兩個欄位可能同時出現，以分析 ID 為主
    pub fn analysis_id(&self) -> Option<&str> {
        self.cme_analysis_id
            .as_deref()
            .or(self.associated_cme_id.as_deref())
    }

    fn model_run(&self) -> Option<&RawEnlil> {
        self.enlil.as_ref().or_else(|| self.enlil_list.first())
    }

    /// Most accurate analysis with a modelled shock arrival.
    pub fn is_earth_bound(&self) -> bool {
        self.is_most_accurate == Some(true)
            && self
                .model_run()
                .and_then(|e| e.estimated_shock_arrival_time.as_ref())
                .is_some()
    }
}

/// 以速度近似 NOAA G 等級；門檻值可把 G3 提前
pub fn storm_risk(speed_km_s: f64, cme_alert_speed: f64) -> StormRisk {
    if speed_km_s >= 1500.0 {
        StormRisk::G5
    } else if speed_km_s >= 1000.0 {
        StormRisk::G4
    } else if speed_km_s >= 800.0 || speed_km_s >= cme_alert_speed {
        StormRisk::G3
    } else if speed_km_s >= 600.0 {
        StormRisk::G2
    } else if speed_km_s >= 500.0 {
        StormRisk::G1
    } else {
        StormRisk::None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmeSummary {
    /// Earth-bound CMEs sorted by estimated arrival.
    pub earth_bound: Vec<CmeRecord>,
    /// (date, earth-bound launches) for the last 7 days, oldest first.
    pub daily_counts: Vec<(NaiveDate, usize)>,
}

impl CmeSummary {
    pub fn next_arrival(&self) -> Option<&str> {
        self.earth_bound.first().map(|c| c.arrival_time.as_str())
    }

    pub fn count(&self) -> usize {
        self.earth_bound.len()
    }
}

pub fn summarize_cmes(raw: &[RawCmeAnalysis], today: NaiveDate, cme_alert_speed: f64) -> CmeSummary {
    let mut daily_counts: Vec<(NaiveDate, usize)> = (0..CME_WINDOW_DAYS)
        .rev()
        .map(|days| (today - Duration::days(days), 0))
        .collect();

    let mut earth_bound = Vec::new();
    for analysis in raw.iter().filter(|a| a.is_earth_bound()) {
        let Some(run) = analysis.model_run() else {
            continue;
        };
        let Some(arrival) = run.estimated_shock_arrival_time.clone() else {
            continue;
        };

        let start_time = analysis.time21_5.clone().unwrap_or_else(|| "N/A".to_string());
        if let Some(date) = start_time
            .split('T')
            .next()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        {
            if let Some(slot) = daily_counts.iter_mut().find(|(day, _)| *day == date) {
                slot.1 += 1;
            }
        }

        let speed = run.speed.or(analysis.speed).unwrap_or(0.0);
        earth_bound.push(CmeRecord {
            analysis_id: analysis.analysis_id().map(str::to_string),
            start_time,
            arrival_time: arrival,
            speed_km_s: speed,
            is_impactor: analysis.is_impactor.unwrap_or(false),
            kp_forecast: run.kp(),
            link: analysis.link.clone(),
            storm_risk: storm_risk(speed, cme_alert_speed),
        });
    }

    // ISO 8601 字串可直接比較
    earth_bound.sort_by(|a, b| a.arrival_time.cmp(&b.arrival_time));
    CmeSummary {
        earth_bound,
        daily_counts,
    }
}

#[derive(Debug, Clone)]
pub struct FlareFeed {
    client: FeedClient,
    base_url: String,
    api_key: String,
}

impl FlareFeed {
    pub fn new(client: FeedClient, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl Feed for FlareFeed {
    type Output = Vec<FlareRecord>;

    fn name(&self) -> &'static str {
        "donki-flr"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(FLARE_WINDOW_DAYS);
        let query = [
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
            ("api_key", self.api_key.clone()),
        ];
        let raw: Vec<RawFlare> = self
            .client
            .get_json(&format!("{}/FLR", self.base_url), &query)
            .await?;
        parse_flares(raw)
    }
}

#[derive(Debug, Clone)]
pub struct CmeFeed {
    client: FeedClient,
    base_url: String,
    api_key: String,
    cme_alert_speed: f64,
}

impl CmeFeed {
    pub fn new(client: FeedClient, base_url: &str, api_key: &str, cme_alert_speed: f64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            cme_alert_speed,
        }
    }
}

#[async_trait]
impl Feed for CmeFeed {
    type Output = CmeSummary;

    fn name(&self) -> &'static str {
        "donki-cme"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let today = Utc::now().date_naive();
        let query = [
            ("startDate", (today - Duration::days(CME_WINDOW_DAYS)).format("%Y-%m-%d").to_string()),
            ("endDate", (today + Duration::days(CME_WINDOW_DAYS)).format("%Y-%m-%d").to_string()),
            ("mostAccurateOnly", "true".to_string()),
            ("api_key", self.api_key.clone()),
        ];
        let raw: Vec<RawCmeAnalysis> = self
            .client
            .get_json(&format!("{}/CMEAnalysis", self.base_url), &query)
            .await?;
        Ok(summarize_cmes(&raw, today, self.cme_alert_speed))
    }
}
