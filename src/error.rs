// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Errors raised while turning feed bytes into a document
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document ended before <{0}> was closed")]
    UnclosedElement(String),

    #[error("Document has no root element")]
    MissingRoot,
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::Xml(quick_xml::Error::InvalidAttr(err))
    }
}

impl From<quick_xml::encoding::EncodingError> for ParseError {
    fn from(err: quick_xml::encoding::EncodingError) -> Self {
        ParseError::Xml(quick_xml::Error::Encoding(err))
    }
}

/// Errors that can occur when fetching or parsing RSS feeds
#[derive(Error, Debug)]
pub enum FeedError {
    /// Network failure, malformed URL, or an HTTP status of 400 and above
    #[error("Failed to fetch feed from {url}{}: {message}", http_status_suffix(.status))]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed feed at {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: ParseError,
    },
}

fn http_status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl FeedError {
    /// HTTP status reported by the server, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            FeedError::Transport { status, .. } => *status,
            FeedError::Malformed { .. } => None,
        }
    }
}

/// Errors raised by the subscription store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Subscription for {feed_url} already exists")]
    DuplicateFeed { feed_url: String },

    #[error("Subscription for {feed_url} has not been saved yet")]
    SubscriptionNotPersisted { feed_url: String },

    #[error("Episode '{guid}' is not attached to a saved subscription")]
    EpisodeNotAttached { guid: String },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectoryFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by the platform media player
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlayerFault(pub String);

/// Errors surfaced by the playback controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Audio focus was denied")]
    FocusDenied,

    #[error("No media has been loaded")]
    NoMedia,

    #[error("Playback resource fault for {uri}: {source}")]
    ResourceFault {
        uri: String,
        #[source]
        source: PlayerFault,
    },

    #[error("Playback service has stopped")]
    ServiceStopped,
}

/// Errors from the podcast directory search
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Directory request failed for {url}: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode directory response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Top-level errors for subscription and sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
