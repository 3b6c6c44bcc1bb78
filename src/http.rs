// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;

const FEED_ACCEPT: &str = "application/rss+xml, application/xml;q=0.9, */*;q=0.8";

/// HTTP response with status and fully buffered body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// True for any status below 400
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch a URL, returning the status and body even for error statuses
    async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Timeouts applied to every request
#[derive(Debug, Clone, Copy)]
pub struct FetchTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub total: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            read: Duration::from_secs(30),
            total: Duration::from_secs(30),
        }
    }
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with the default 30 second timeouts
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(FetchTimeouts::default())
    }

    /// Create a client with custom timeouts
    pub fn with_timeouts(timeouts: FetchTimeouts) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .timeout(timeouts.total)
            .user_agent(concat!("podkeep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_created() {
        let _client = ReqwestClient::new().unwrap();
        let _custom = ReqwestClient::with_timeouts(FetchTimeouts {
            connect: Duration::from_secs(1),
            read: Duration::from_secs(2),
            total: Duration::from_secs(3),
        })
        .unwrap();
    }

    #[test]
    fn reqwest_client_can_be_cloned() {
        let client = ReqwestClient::with_client(reqwest::Client::new());
        let _cloned = client.clone();
    }

    #[test]
    fn default_timeouts_are_thirty_seconds() {
        let timeouts = FetchTimeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(30));
        assert_eq!(timeouts.read, Duration::from_secs(30));
        assert_eq!(timeouts.total, Duration::from_secs(30));
    }

    #[test]
    fn error_statuses_are_not_success() {
        let ok = HttpResponse {
            status: 399,
            body: Bytes::new(),
        };
        let err = HttpResponse {
            status: 400,
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        assert!(!err.is_success());
    }

    #[tokio::test]
    async fn invalid_url_is_a_request_error() {
        let client = ReqwestClient::new().unwrap();
        assert!(client.get("not a url").await.is_err());
    }
}
