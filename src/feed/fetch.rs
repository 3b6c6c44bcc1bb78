// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{FeedDocument, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
///
/// Request failures and statuses of 400 and above are both reported as
/// [`FeedError::Transport`]; the latter carries the server's error body.
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    Url::parse(url).map_err(|e| FeedError::Transport {
        url: url.to_string(),
        status: None,
        message: format!("invalid URL: {e}"),
    })?;

    let response = client.get(url).await.map_err(|e| FeedError::Transport {
        url: url.to_string(),
        status: None,
        message: e.to_string(),
    })?;

    if !response.is_success() {
        return Err(FeedError::Transport {
            url: url.to_string(),
            status: Some(response.status),
            message: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }

    debug!(url, bytes = response.body.len(), "fetched feed");
    Ok(response.body)
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient>(client: &C, url: &str) -> Result<FeedDocument, FeedError> {
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes).map_err(|source| FeedError::Malformed {
        url: url.to_string(),
        source,
    })
}
