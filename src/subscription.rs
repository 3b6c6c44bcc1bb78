// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::{FeedDocument, FeedItem, parse_rss_date_or_now};

/// A podcast the user follows (or is previewing before subscribing)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    /// Store identity; `None` until saved
    pub id: Option<i64>,
    /// Natural key: one subscription per feed URL
    pub feed_url: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub last_updated: DateTime<Utc>,
    pub episodes: Vec<Episode>,
}

/// A single episode, identified within its subscription by `guid`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub guid: String,
    pub subscription_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub media_url: String,
    pub mime_type: String,
    pub pub_date: DateTime<Utc>,
    pub duration: String,
}

impl Episode {
    /// Build an episode from a parsed feed item
    ///
    /// Items without a guid use their media URL as identity. Missing or
    /// unparsable dates become the current time.
    pub fn from_item(item: &FeedItem) -> Self {
        let media_url = item.media_url.clone().unwrap_or_default();
        let guid = item
            .guid
            .clone()
            .filter(|guid| !guid.is_empty())
            .unwrap_or_else(|| media_url.clone());

        Self {
            guid,
            subscription_id: None,
            title: item.title.clone().unwrap_or_default(),
            description: item.description.clone().unwrap_or_default(),
            media_url,
            mime_type: item.mime_type.clone().unwrap_or_default(),
            pub_date: parse_rss_date_or_now(item.pub_date.as_deref()),
            duration: item.duration.clone().unwrap_or_default(),
        }
    }

    /// True when the enclosure is a video
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video")
    }
}

impl Subscription {
    /// Convert a freshly parsed feed into an unsaved subscription
    pub fn from_feed(feed_url: &str, image_url: &str, document: &FeedDocument) -> Self {
        Self {
            id: None,
            feed_url: feed_url.to_string(),
            title: document.title.clone(),
            description: document.description_or_summary().to_string(),
            image_url: image_url.to_string(),
            last_updated: document.last_updated,
            episodes: document.episodes.iter().map(Episode::from_item).collect(),
        }
    }

    /// True once the store has assigned an id
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }
}
