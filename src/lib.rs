pub mod directory;
pub mod error;
pub mod feed;
pub mod html;
pub mod http;
pub mod playback;
pub mod progress;
pub mod state;
pub mod store;
pub mod subscription;
pub mod sync;

// Re-export main types for convenience
pub use directory::{PodcastSummary, search_podcasts};
pub use error::{
    DirectoryError, FeedError, ParseError, PlaybackError, PlayerFault, StorageError, SyncError,
};
pub use feed::{FeedDocument, FeedItem, fetch_feed, parse_feed, parse_rss_date};
pub use html::html_to_text;
pub use http::{FetchTimeouts, HttpClient, HttpResponse, ReqwestClient};
pub use playback::{
    AudioFocus, MediaMetadata, MediaPlayer, PlaybackCommand, PlaybackController, PlaybackObserver,
    PlaybackService, PlaybackSnapshot, PlaybackState,
};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, UpdateSummary,
};
pub use state::{LocalState, SyncPlan, create_sync_plan};
pub use store::{SqliteStore, Storage};
pub use subscription::{Episode, Subscription};
pub use sync::{SyncEngine, SyncOptions};
