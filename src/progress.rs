use std::sync::Arc;

use serde::Serialize;

/// One subscription that gained episodes during a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub feed_url: String,
    pub title: String,
    pub new_count: usize,
}

/// Events emitted while looking up or refreshing subscriptions
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed and diffed against the store
    FeedParsed {
        podcast_title: String,
        total_episodes: usize,
        new_episodes: usize,
    },

    /// Feed could not be fetched or parsed; it is retried next cycle
    FeedSkipped { url: String, error: String },

    /// New episodes were stored for a subscription
    EpisodesAdded(UpdateSummary),

    /// Refresh of all subscriptions finished
    SyncCompleted {
        checked_count: usize,
        updated_count: usize,
        skipped_count: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress, post
/// notifications, or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
