use crate::core::http::FeedClient;
use crate::domain::model::SeismicEvent;
use crate::domain::ports::Feed;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub properties: Properties,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    /// epoch milliseconds
    pub time: Option<i64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// [lon, lat, depth]
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

impl Feature {
    /// 缺少規模、深度或時間，或規模為負值的事件直接略過
    pub fn to_event(&self) -> Option<SeismicEvent> {
        let coordinates = &self.geometry.as_ref()?.coordinates;
        let longitude = (*coordinates.first()?)?;
        let latitude = (*coordinates.get(1)?)?;
        let depth_km = (*coordinates.get(2)?)?;

        let magnitude = self.properties.mag?;
        if magnitude < 0.0 {
            return None;
        }
        let timestamp = DateTime::from_timestamp_millis(self.properties.time?)?;

        let place = match self.properties.place.as_deref().map(str::trim) {
            Some(place) if !place.is_empty() && place != "null" => place.to_string(),
            _ => SeismicEvent::fallback_place(latitude, longitude),
        };

        Some(SeismicEvent {
            id: self.id.clone(),
            latitude,
            longitude,
            depth_km,
            magnitude,
            timestamp,
            place,
            source_url: self.properties.url.clone().filter(|u| !u.is_empty()),
        })
    }
}

impl FeatureCollection {
    pub fn ids(&self) -> Vec<String> {
        self.features.iter().map(|f| f.id.clone()).collect()
    }

    /// Valid events in feed order.
    pub fn events(&self) -> Vec<SeismicEvent> {
        self.features.iter().filter_map(Feature::to_event).collect()
    }
}

#[derive(Debug, Clone)]
pub struct UsgsFeed {
    client: FeedClient,
    summary_url: String,
    query_url: String,
}

impl UsgsFeed {
    pub const PLAYBACK_MIN_MAGNITUDE: &'static str = "3";

    pub fn new(client: FeedClient, summary_url: &str, query_url: &str) -> Self {
        Self {
            client,
            summary_url: summary_url.trim_end_matches('/').to_string(),
            query_url: query_url.to_string(),
        }
    }

    async fn summary(&self, name: &str) -> Result<FeatureCollection> {
        let url = format!("{}/{}.geojson", self.summary_url, name);
        self.client.get_json(&url, &[]).await
    }

    /// Last-hour events, oldest first.
    pub async fn fetch_live(&self) -> Result<Vec<SeismicEvent>> {
        let collection = self.summary("all_hour").await?;
        let mut events = collection.events();
        // 摘要 feed 由新到舊排列
        events.reverse();
        Ok(events)
    }

    /// Ids of the last day's events, used to skip history on startup.
    pub async fn fetch_seed_ids(&self) -> Result<Vec<String>> {
        Ok(self.summary("all_day").await?.ids())
    }

    pub async fn fetch_playback(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<SeismicEvent>> {
        let query = [
            ("format", "geojson".to_string()),
            ("starttime", start.format("%Y-%m-%d").to_string()),
            ("endtime", end.format("%Y-%m-%d").to_string()),
            ("minmagnitude", Self::PLAYBACK_MIN_MAGNITUDE.to_string()),
        ];
        let collection: FeatureCollection = self.client.get_json(&self.query_url, &query).await?;

        let mut events = collection.events();
        events.sort_by_key(|e| e.timestamp);
        Ok(events)
    }
}

#[async_trait]
impl Feed for UsgsFeed {
    type Output = Vec<SeismicEvent>;

    fn name(&self) -> &'static str {
        "usgs"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        self.fetch_live().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn feature(id: &str, mag: serde_json::Value, depth: serde_json::Value, time: i64, place: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": {"mag": mag, "place": place, "time": time, "url": format!("https://earthquake.usgs.gov/earthquakes/eventpage/{}", id)},
            "geometry": {"type": "Point", "coordinates": [142.4, 38.3, depth]}
        })
    }

    fn collection(features: Vec<serde_json::Value>) -> FeatureCollection {
        serde_json::from_value(json!({"type": "FeatureCollection", "features": features})).unwrap()
    }

    #[test]
    fn test_invalid_features_are_skipped() {
        let parsed = collection(vec![
            feature("ok", json!(4.5), json!(10.0), 1_700_000_000_000, json!("near Honshu")),
            feature("nomag", json!(null), json!(10.0), 1_700_000_000_000, json!("x")),
            feature("nodepth", json!(4.0), json!(null), 1_700_000_000_000, json!("x")),
            feature("negative", json!(-0.4), json!(3.0), 1_700_000_000_000, json!("x")),
        ]);

        let events = parsed.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
        assert_eq!(events[0].latitude, 38.3);
        assert_eq!(events[0].longitude, 142.4);
        assert_eq!(events[0].timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(parsed.ids().len(), 4);
    }

    #[test]
    fn test_zero_magnitude_is_kept() {
        let parsed = collection(vec![feature("zero", json!(0.0), json!(1.0), 0, json!("x"))]);
        assert_eq!(parsed.events().len(), 1);
    }

    #[test]
    fn test_missing_place_uses_coordinates() {
        let parsed = collection(vec![
            feature("a", json!(3.0), json!(5.0), 0, json!(null)),
            feature("b", json!(3.0), json!(5.0), 0, json!("null")),
            feature("c", json!(3.0), json!(5.0), 0, json!("")),
        ]);
        for event in parsed.events() {
            assert_eq!(event.place, "Coordinates: 38.30, 142.40");
        }
    }

    #[tokio::test]
    async fn test_live_feed_is_oldest_first() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/summary/all_hour.geojson");
            then.status(200).json_body(json!({
                "type": "FeatureCollection",
                "features": [
                    feature("newer", json!(2.1), json!(8.0), 2_000, json!("b")),
                    feature("older", json!(1.4), json!(4.0), 1_000, json!("a"))
                ]
            }));
        });

        let feed = UsgsFeed::new(FeedClient::new(5).unwrap(), &server.url("/summary/"), &server.url("/query"));
        let events = feed.fetch().await.unwrap();

        mock.assert();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["older", "newer"]);
    }

    #[tokio::test]
    async fn test_playback_query_and_sorting() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/query")
                .query_param("format", "geojson")
                .query_param("starttime", "2011-03-10")
                .query_param("endtime", "2011-03-12")
                .query_param("minmagnitude", "3");
            then.status(200).json_body(json!({
                "features": [
                    feature("late", json!(9.1), json!(29.0), 1_299_822_000_000, json!("Tohoku")),
                    feature("early", json!(7.3), json!(32.0), 1_299_637_000_000, json!("Sanriku"))
                ]
            }));
        });

        let feed = UsgsFeed::new(FeedClient::new(5).unwrap(), &server.url("/summary"), &server.url("/query"));
        let start = NaiveDate::from_ymd_opt(2011, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2011, 3, 12).unwrap();
        let events = feed.fetch_playback(start, end).await.unwrap();

        mock.assert();
        assert_eq!(events[0].id, "early");
        assert_eq!(events[1].id, "late");
    }

    #[tokio::test]
    async fn test_seed_ids() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/summary/all_day.geojson");
            then.status(200).json_body(json!({
                "features": [
                    feature("a", json!(1.0), json!(1.0), 0, json!("x")),
                    feature("b", json!(null), json!(1.0), 0, json!("x"))
                ]
            }));
        });

        let feed = UsgsFeed::new(FeedClient::new(5).unwrap(), &server.url("/summary"), &server.url("/query"));
        assert_eq!(feed.fetch_seed_ids().await.unwrap(), vec!["a", "b"]);
    }
}
