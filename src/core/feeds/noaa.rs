use super::{value_as_f64, value_as_string};
use crate::core::http::FeedClient;
use crate::domain::ports::Feed;
use crate::utils::error::{Result, SentinelError};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlareProbability {
    pub m_class: u32,
    pub x_class: u32,
}

pub fn flare_probability_pattern() -> Result<Regex> {
    Regex::new(r"(?i)\b([mx])-flare probability:\s*(\d+)%").map_err(|e| SentinelError::ProcessingError {
        message: format!("invalid flare probability pattern: {}", e),
    })
}

/// Reads the percentages out of the newest forecast's free-text message.
/// Missing values count as 0; the first mention of each class wins.
pub fn parse_flare_probability(pattern: &Regex, forecasts: &Value) -> FlareProbability {
    let message = forecasts
        .as_array()
        .and_then(|entries| entries.last())
        .and_then(|latest| latest.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut m_class = None;
    let mut x_class = None;
    for caps in pattern.captures_iter(message) {
        let Ok(percent) = caps[2].parse::<u32>() else {
            continue;
        };
        let slot = if caps[1].eq_ignore_ascii_case("m") {
            &mut m_class
        } else {
            &mut x_class
        };
        if slot.is_none() {
            *slot = Some(percent);
        }
    }

    FlareProbability {
        m_class: m_class.unwrap_or(0),
        x_class: x_class.unwrap_or(0),
    }
}

/// NOAA products come either as a header row followed by value rows, or as
/// an array of objects. Both are flattened to (time_tag, row) lookups.
fn rows<'a>(payload: &'a Value, columns: &[&str]) -> Vec<Vec<Option<&'a Value>>> {
    let Some(entries) = payload.as_array() else {
        return Vec::new();
    };

    match entries.first() {
        Some(Value::Array(header)) => {
            let names: Vec<String> = header
                .iter()
                .map(|h| h.as_str().unwrap_or_default().to_lowercase())
                .collect();
            let indexes: Vec<Option<usize>> = columns
                .iter()
                .map(|c| names.iter().position(|n| n == &c.to_lowercase()))
                .collect();

            entries[1..]
                .iter()
                .filter_map(Value::as_array)
                .map(|row| {
                    indexes
                        .iter()
                        .map(|index| index.and_then(|i| row.get(i)))
                        .collect()
                })
                .collect()
        }
        Some(Value::Object(_)) => entries
            .iter()
            .filter_map(Value::as_object)
            .map(|object| {
                columns
                    .iter()
                    .map(|c| {
                        object
                            .iter()
                            .find(|(key, _)| key.eq_ignore_ascii_case(c))
                            .map(|(_, v)| v)
                    })
                    .collect()
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Latest numeric planetary Kp by time tag, rounded to the nearest integer.
pub fn parse_kp_index(payload: &Value) -> Option<u32> {
    let mut readings: Vec<(String, f64)> = rows(payload, &["time_tag", "kp"])
        .into_iter()
        .chain(rows(payload, &["time_tag", "kp_index"]))
        .filter_map(|row| {
            let time = row[0].and_then(value_as_string)?;
            let kp = row[1].and_then(value_as_f64)?;
            Some((time, kp))
        })
        .collect();

    readings.sort_by(|a, b| a.0.cmp(&b.0));
    readings
        .last()
        .map(|(_, kp)| kp.round().clamp(0.0, 9.0) as u32)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarWindSample {
    pub speed_km_s: f64,
    pub density_p_cc: f64,
}

/// 取最後一筆同時具有速度與密度的資料
pub fn parse_solar_wind(payload: &Value) -> Option<SolarWindSample> {
    rows(payload, &["speed", "density"])
        .into_iter()
        .filter_map(|row| {
            Some(SolarWindSample {
                speed_km_s: row[0].and_then(value_as_f64)?,
                density_p_cc: row[1].and_then(value_as_f64)?,
            })
        })
        .last()
}

#[derive(Debug, Clone)]
pub struct FlareProbabilityFeed {
    client: FeedClient,
    url: String,
    pattern: Regex,
}

impl FlareProbabilityFeed {
    pub fn new(client: FeedClient, url: &str) -> Result<Self> {
        Ok(Self {
            client,
            url: url.to_string(),
            pattern: flare_probability_pattern()?,
        })
    }
}

#[async_trait]
impl Feed for FlareProbabilityFeed {
    type Output = FlareProbability;

    fn name(&self) -> &'static str {
        "noaa-flare-probability"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let payload: Value = self.client.get_json(&self.url, &[]).await?;
        Ok(parse_flare_probability(&self.pattern, &payload))
    }
}

#[derive(Debug, Clone)]
pub struct KpIndexFeed {
    client: FeedClient,
    url: String,
}

impl KpIndexFeed {
    pub fn new(client: FeedClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Feed for KpIndexFeed {
    type Output = Option<u32>;

    fn name(&self) -> &'static str {
        "noaa-kp"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let payload: Value = self.client.get_json(&self.url, &[]).await?;
        Ok(parse_kp_index(&payload))
    }
}

#[derive(Debug, Clone)]
pub struct SolarWindFeed {
    client: FeedClient,
    url: String,
}

impl SolarWindFeed {
    pub fn new(client: FeedClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Feed for SolarWindFeed {
    type Output = Option<SolarWindSample>;

    fn name(&self) -> &'static str {
        "noaa-solar-wind"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let payload: Value = self.client.get_json(&self.url, &[]).await?;
        Ok(parse_solar_wind(&payload))
    }
}
