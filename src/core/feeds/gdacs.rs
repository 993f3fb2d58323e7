use crate::core::http::FeedClient;
use crate::domain::model::DisasterAlert;
use crate::domain::ports::Feed;
use crate::utils::error::Result;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Default)]
struct ItemFields {
    published: Option<String>,
    event_type: Option<String>,
    country: Option<String>,
    alert_level: Option<String>,
    link: Option<String>,
    georss_point: Option<String>,
    gdacs_point: Option<String>,
}

impl ItemFields {
    fn slot(&mut self, tag: &[u8]) -> Option<&mut Option<String>> {
        match tag {
            b"pubDate" => Some(&mut self.published),
            b"gdacs:eventtype" => Some(&mut self.event_type),
            b"gdacs:country" => Some(&mut self.country),
            b"gdacs:alertlevel" => Some(&mut self.alert_level),
            b"link" => Some(&mut self.link),
            b"georss:point" => Some(&mut self.georss_point),
            b"gdacs:point" => Some(&mut self.gdacs_point),
            _ => None,
        }
    }

    fn into_alert(self) -> DisasterAlert {
        // georss:point 優先，其次 gdacs:point，格式皆為 "lat lon"
        let (latitude, longitude) = self
            .georss_point
            .as_deref()
            .and_then(parse_point)
            .or_else(|| self.gdacs_point.as_deref().and_then(parse_point))
            .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));

        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        DisasterAlert {
            published: or_na(self.published),
            event_type: or_na(self.event_type),
            country: or_na(self.country),
            alert_level: or_na(self.alert_level),
            link: self.link.unwrap_or_default(),
            latitude,
            longitude,
        }
    }
}

fn parse_point(text: &str) -> Option<(f64, f64)> {
    let mut parts = text.split_whitespace();
    let lat = parts.next()?.parse::<f64>().ok()?;
    let lon = parts.next()?.parse::<f64>().ok()?;
    Some((lat, lon))
}

/// Parses the GDACS RSS document into one alert per `<item>`.
pub fn parse_rss(xml: &str) -> Result<Vec<DisasterAlert>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut alerts = Vec::new();
    let mut item: Option<ItemFields> = None;
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"item" {
                    item = Some(ItemFields::default());
                    current = None;
                } else if item.is_some() {
                    current = Some(name);
                }
            }
            Event::Text(text) => {
                if let (Some(fields), Some(tag)) = (item.as_mut(), current.as_deref()) {
                    if let Some(slot) = fields.slot(tag) {
                        slot.get_or_insert_with(String::new).push_str(&text.unescape()?);
                    }
                }
            }
            Event::CData(data) => {
                if let (Some(fields), Some(tag)) = (item.as_mut(), current.as_deref()) {
                    if let Some(slot) = fields.slot(tag) {
                        let raw = data.into_inner();
                        slot.get_or_insert_with(String::new)
                            .push_str(&String::from_utf8_lossy(&raw));
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"item" {
                    if let Some(fields) = item.take() {
                        alerts.push(fields.into_alert());
                    }
                }
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(alerts)
}

#[derive(Debug, Clone)]
pub struct GdacsFeed {
    client: FeedClient,
    url: String,
}

impl GdacsFeed {
    pub fn new(client: FeedClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Feed for GdacsFeed {
    type Output = Vec<DisasterAlert>;

    fn name(&self) -> &'static str {
        "gdacs"
    }

    async fn fetch(&self) -> Result<Self::Output> {
        let body = self.client.get_text(&self.url, &[]).await?;
        parse_rss(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:gdacs="http://www.gdacs.org" xmlns:georss="http://www.georss.org/georss">
  <channel>
    <title>GDACS RSS information</title>
    <link>https://www.gdacs.org/</link>
    <item>
      <title><![CDATA[Red earthquake alert in Japan]]></title>
      <link>https://www.gdacs.org/report.aspx?eventtype=EQ&amp;eventid=1</link>
      <pubDate>Fri, 11 Mar 2011 05:46:23 GMT</pubDate>
      <gdacs:alertlevel>Red</gdacs:alertlevel>
      <gdacs:eventtype>EQ</gdacs:eventtype>
      <gdacs:country>Japan</gdacs:country>
      <georss:point>38.297 142.373</georss:point>
    </item>
    <item>
      <title>Green flood alert</title>
      <link>https://www.gdacs.org/report.aspx?eventtype=FL&amp;eventid=2</link>
      <pubDate>Sat, 12 Mar 2011 00:00:00 GMT</pubDate>
      <gdacs:alertlevel>Green</gdacs:alertlevel>
      <gdacs:eventtype>FL</gdacs:eventtype>
      <gdacs:country><![CDATA[Brazil]]></gdacs:country>
      <gdacs:point>-10.5 -50.25</gdacs:point>
    </item>
    <item>
      <title>No metadata</title>
      <georss:point>not a point</georss:point>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let alerts = parse_rss(SAMPLE).unwrap();
        assert_eq!(alerts.len(), 3);

        let japan = &alerts[0];
        assert_eq!(japan.alert_level, "Red");
        assert_eq!(japan.event_type, "EQ");
        assert_eq!(japan.country, "Japan");
        assert_eq!(japan.published, "Fri, 11 Mar 2011 05:46:23 GMT");
        assert_eq!(japan.link, "https://www.gdacs.org/report.aspx?eventtype=EQ&eventid=1");
        assert_eq!(japan.latitude, Some(38.297));
        assert_eq!(japan.longitude, Some(142.373));
        assert!(japan.is_severe());

        let brazil = &alerts[1];
        assert_eq!(brazil.country, "Brazil");
        assert_eq!(brazil.latitude, Some(-10.5));
        assert!(!brazil.is_severe());

        let empty = &alerts[2];
        assert_eq!(empty.alert_level, "N/A");
        assert_eq!(empty.latitude, None);
    }

    #[test]
    fn test_channel_link_is_not_an_item() {
        let alerts = parse_rss("<rss><channel><link>https://x</link></channel></rss>").unwrap();
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_rss("<rss><channel><item></channel></rss>").is_err());
    }

    #[tokio::test]
    async fn test_feed_fetches_rss() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rss.aspx");
            then.status(200)
                .header("content-type", "application/rss+xml")
                .body(SAMPLE);
        });

        let feed = GdacsFeed::new(FeedClient::new(5).unwrap(), &server.url("/rss.aspx"));
        let alerts = feed.fetch().await.unwrap();
        assert_eq!(alerts.iter().filter(|a| a.is_severe()).count(), 1);
    }
}
