mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use crate::subscription::{Episode, Subscription};

/// Persistence for subscriptions and their episodes
///
/// Episodes belong to exactly one subscription; deleting the
/// subscription removes them.
pub trait Storage: Send + Sync {
    /// Look up a subscription by feed URL. Episodes are not attached.
    fn find_subscription_by_url(&self, url: &str) -> Result<Option<Subscription>, StorageError>;

    /// All subscriptions ordered by title. Episodes are not attached.
    fn list_subscriptions(&self) -> Result<Vec<Subscription>, StorageError>;

    /// Episodes of one subscription, newest first
    fn list_episodes(&self, subscription_id: i64) -> Result<Vec<Episode>, StorageError>;

    /// Insert a subscription row and return its new id
    fn insert_subscription(&self, subscription: &Subscription) -> Result<i64, StorageError>;

    /// Insert or replace one episode; `subscription_id` must be set
    fn insert_episode(&self, episode: &Episode) -> Result<(), StorageError>;

    /// Insert episodes for a subscription in a single transaction
    ///
    /// Either every episode is written or none is.
    fn insert_episodes(
        &self,
        subscription_id: i64,
        episodes: &[Episode],
    ) -> Result<usize, StorageError>;

    /// Delete a subscription and, by cascade, its episodes
    fn delete_subscription(&self, subscription: &Subscription) -> Result<(), StorageError>;
}
