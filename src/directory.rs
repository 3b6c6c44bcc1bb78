// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::DirectoryError;
use crate::http::HttpClient;

/// iTunes search endpoint
pub const ITUNES_SEARCH_URL: &str = "https://itunes.apple.com/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultCount", default)]
    result_count: usize,
    #[serde(default)]
    results: Vec<ItunesPodcast>,
}

#[derive(Debug, Deserialize)]
struct ItunesPodcast {
    #[serde(rename = "collectionCensoredName")]
    collection_censored_name: Option<String>,
    #[serde(rename = "feedUrl")]
    feed_url: Option<String>,
    #[serde(rename = "artworkUrl30")]
    artwork_url_30: Option<String>,
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

/// A directory hit that can be subscribed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodcastSummary {
    pub name: String,
    /// Short `YYYY-MM-DD` date, or `-` when unknown
    pub last_updated: String,
    pub image_url: String,
    pub feed_url: String,
}

impl PodcastSummary {
    fn from_itunes(podcast: ItunesPodcast) -> Option<Self> {
        let feed_url = podcast.feed_url.filter(|url| !url.is_empty())?;
        Some(Self {
            name: podcast.collection_censored_name.unwrap_or_default(),
            last_updated: short_date(podcast.release_date.as_deref()),
            image_url: podcast
                .artwork_url_100
                .or(podcast.artwork_url_30)
                .unwrap_or_default(),
            feed_url,
        })
    }
}

/// Render an iTunes release date as `YYYY-MM-DD`
pub fn short_date(release_date: Option<&str>) -> String {
    let Some(value) = release_date.map(str::trim) else {
        return "-".to_string();
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.format("%Y-%m-%d").to_string();
    }
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
        Err(_) => "-".to_string(),
    }
}

/// Build the search URL for a term, query-encoded
pub fn search_url(term: &str) -> Result<Url, DirectoryError> {
    Ok(Url::parse_with_params(
        ITUNES_SEARCH_URL,
        &[("media", "podcast"), ("term", term)],
    )?)
}

/// Search the iTunes directory for podcasts matching `term`
///
/// Results without a feed URL cannot be subscribed to and are dropped. A
/// non-success HTTP status yields an empty list.
pub async fn search_podcasts<C: HttpClient>(
    client: &C,
    term: &str,
) -> Result<Vec<PodcastSummary>, DirectoryError> {
    let url = search_url(term)?;
    let response = client
        .get(url.as_str())
        .await
        .map_err(|source| DirectoryError::RequestFailed {
            url: url.to_string(),
            source,
        })?;

    if !response.is_success() {
        warn!(term, status = response.status, "directory search failed");
        return Ok(Vec::new());
    }

    let decoded: SearchResponse = serde_json::from_slice(&response.body)?;
    debug!(term, result_count = decoded.result_count, "directory search");

    Ok(decoded
        .results
        .into_iter()
        .filter_map(PodcastSummary::from_itunes)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::http::HttpResponse;

    struct RecordingClient {
        status: u16,
        body: &'static str,
        requested: Mutex<Vec<String>>,
    }

    impl RecordingClient {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for RecordingClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.requested.lock().unwrap().push(url.to_string());
            Ok(HttpResponse {
                status: self.status,
                body: Bytes::from_static(self.body.as_bytes()),
            })
        }
    }

    const RESPONSE: &str = r#"{
  "resultCount": 3,
  "results": [
    {
      "collectionCensoredName": "Rust Radio",
      "feedUrl": "https://rust.example.com/feed.xml",
      "artworkUrl30": "https://rust.example.com/30.jpg",
      "artworkUrl100": "https://rust.example.com/100.jpg",
      "releaseDate": "2024-03-05T12:00:00Z"
    },
    {
      "collectionCensoredName": "No Feed",
      "artworkUrl30": "https://nofeed.example.com/30.jpg"
    },
    {
      "collectionCensoredName": "Small Art",
      "feedUrl": "https://small.example.com/rss",
      "artworkUrl30": "https://small.example.com/30.jpg",
      "trackCount": 12
    }
  ]
}"#;

    #[test]
    fn search_url_encodes_term() {
        let url = search_url("rust & friends").unwrap();
        assert_eq!(
            url.as_str(),
            "https://itunes.apple.com/search?media=podcast&term=rust+%26+friends"
        );
    }

    #[test]
    fn short_date_formats() {
        assert_eq!(short_date(Some("2024-03-05T12:00:00Z")), "2024-03-05");
        assert_eq!(short_date(Some("2024-03-05T12:00:00")), "2024-03-05");
        assert_eq!(short_date(Some("yesterday")), "-");
        assert_eq!(short_date(None), "-");
    }

    #[tokio::test]
    async fn search_maps_results_and_drops_missing_feeds() {
        let client = RecordingClient::new(200, RESPONSE);

        let results = search_podcasts(&client, "rust").await.unwrap();

        assert_eq!(
            results,
            vec![
                PodcastSummary {
                    name: "Rust Radio".to_string(),
                    last_updated: "2024-03-05".to_string(),
                    image_url: "https://rust.example.com/100.jpg".to_string(),
                    feed_url: "https://rust.example.com/feed.xml".to_string(),
                },
                PodcastSummary {
                    name: "Small Art".to_string(),
                    last_updated: "-".to_string(),
                    image_url: "https://small.example.com/30.jpg".to_string(),
                    feed_url: "https://small.example.com/rss".to_string(),
                },
            ]
        );
        assert_eq!(
            client.requested.lock().unwrap()[0],
            "https://itunes.apple.com/search?media=podcast&term=rust"
        );
    }

    #[tokio::test]
    async fn error_status_yields_no_results() {
        let client = RecordingClient::new(503, "unavailable");
        assert!(search_podcasts(&client, "rust").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let client = RecordingClient::new(200, "<html>not json</html>");
        let err = search_podcasts(&client, "rust").await.unwrap_err();
        assert!(matches!(err, DirectoryError::Decode(_)));
    }

    #[tokio::test]
    async fn empty_response_yields_no_results() {
        let client = RecordingClient::new(200, r#"{"resultCount":0,"results":[]}"#);
        assert!(search_podcasts(&client, "nothing").await.unwrap().is_empty());
    }
}
