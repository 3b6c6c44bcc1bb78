// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::pin;

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use crate::error::{StorageError, SyncError};
use crate::feed::{FeedDocument, fetch_feed};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter, UpdateSummary};
use crate::state::{LocalState, create_sync_plan};
use crate::store::Storage;
use crate::subscription::{Episode, Subscription};

/// Options for refreshing subscriptions
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum number of feeds fetched and parsed at the same time.
    /// Results are still committed one subscription at a time, in order.
    pub max_concurrent_fetches: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
        }
    }
}

/// Looks up, saves and refreshes subscriptions
///
/// Feeds come from the HTTP client, persisted state from the store.
/// Every refresh diffs remote episodes against stored ones by guid and
/// writes only the difference.
pub struct SyncEngine<C, S> {
    client: C,
    store: S,
    reporter: SharedProgressReporter,
    options: SyncOptions,
}

impl<C: HttpClient, S: Storage> SyncEngine<C, S> {
    pub fn new(client: C, store: S, reporter: SharedProgressReporter) -> Self {
        Self {
            client,
            store,
            reporter,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Find a podcast by feed URL
    ///
    /// A stored subscription is returned with its episodes and no network
    /// access. Otherwise the feed is fetched and returned unsaved. A feed
    /// that cannot be fetched or parsed yields `Ok(None)`.
    pub async fn get_podcast(&self, feed_url: &str) -> Result<Option<Subscription>, SyncError> {
        if let Some(mut subscription) = self.store.find_subscription_by_url(feed_url)? {
            if let Some(id) = subscription.id {
                subscription.episodes = self.store.list_episodes(id)?;
            }
            debug!(feed_url, "podcast served from store");
            return Ok(Some(subscription));
        }

        self.reporter.report(ProgressEvent::FetchingFeed {
            url: feed_url.to_string(),
        });

        match fetch_feed(&self.client, feed_url).await {
            Ok(document) => {
                let subscription = Subscription::from_feed(feed_url, "", &document);
                self.reporter.report(ProgressEvent::FeedParsed {
                    podcast_title: subscription.title.clone(),
                    total_episodes: subscription.episodes.len(),
                    new_episodes: subscription.episodes.len(),
                });
                Ok(Some(subscription))
            }
            Err(e) => {
                warn!(feed_url, error = %e, "podcast lookup failed");
                self.reporter.report(ProgressEvent::FeedSkipped {
                    url: feed_url.to_string(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    /// Persist a subscription and its in-memory episodes
    ///
    /// Episodes go through the same guid plan as a refresh: unidentified
    /// items are dropped and a repeated guid keeps its first occurrence.
    /// Afterwards `subscription.episodes` holds exactly what was stored,
    /// each carrying the generated id.
    pub fn save(&self, subscription: &mut Subscription) -> Result<i64, SyncError> {
        let id = self.store.insert_subscription(subscription)?;
        subscription.id = Some(id);

        let episodes = std::mem::take(&mut subscription.episodes);
        let plan = create_sync_plan(episodes, &LocalState::default());
        if plan.unidentified > 0 {
            debug!(
                feed_url = %subscription.feed_url,
                skipped = plan.unidentified,
                "episodes without guid or media URL not stored"
            );
        }

        subscription.episodes = plan.new_episodes;
        for episode in &mut subscription.episodes {
            episode.subscription_id = Some(id);
        }
        let stored = self.store.insert_episodes(id, &subscription.episodes)?;
        info!(feed_url = %subscription.feed_url, episodes = stored, "subscription saved");
        Ok(id)
    }

    /// Remove a subscription; its episodes go with it
    pub fn delete(&self, subscription: &Subscription) -> Result<(), SyncError> {
        self.store.delete_subscription(subscription)?;
        info!(feed_url = %subscription.feed_url, "subscription deleted");
        Ok(())
    }

    /// All stored subscriptions ordered by title, without episodes
    pub fn list_subscriptions(&self) -> Result<Vec<Subscription>, SyncError> {
        Ok(self.store.list_subscriptions()?)
    }

    /// Stored episodes of a saved subscription, newest first
    pub fn episodes_for(&self, subscription: &Subscription) -> Result<Vec<Episode>, SyncError> {
        let id = subscription
            .id
            .ok_or_else(|| StorageError::SubscriptionNotPersisted {
                feed_url: subscription.feed_url.clone(),
            })?;
        Ok(self.store.list_episodes(id)?)
    }

    /// Refresh every stored subscription and store new episodes
    ///
    /// Returns one summary per subscription that gained episodes. A feed
    /// that fails to fetch, parse or store is skipped for this cycle
    /// without affecting the others.
    pub async fn update_all_subscriptions(&self) -> Result<Vec<UpdateSummary>, SyncError> {
        let subscriptions = self.store.list_subscriptions()?;
        let checked_count = subscriptions.len();
        let client = &self.client;
        let reporter = &self.reporter;

        let mut fetches = pin!(
            stream::iter(subscriptions)
                .map(|subscription| async move {
                    reporter.report(ProgressEvent::FetchingFeed {
                        url: subscription.feed_url.clone(),
                    });
                    let result = fetch_feed(client, &subscription.feed_url).await;
                    (subscription, result)
                })
                .buffered(self.options.max_concurrent_fetches.max(1))
        );

        let mut summaries = Vec::new();
        let mut skipped_count = 0;

        while let Some((subscription, result)) = fetches.next().await {
            let outcome = match result {
                Ok(document) => self
                    .apply_remote(&subscription, &document)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(Some(summary)) => {
                    info!(
                        feed_url = %summary.feed_url,
                        new_episodes = summary.new_count,
                        "subscription updated"
                    );
                    reporter.report(ProgressEvent::EpisodesAdded(summary.clone()));
                    summaries.push(summary);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(feed_url = %subscription.feed_url, %error, "skipping subscription");
                    reporter.report(ProgressEvent::FeedSkipped {
                        url: subscription.feed_url.clone(),
                        error,
                    });
                    skipped_count += 1;
                }
            }
        }

        reporter.report(ProgressEvent::SyncCompleted {
            checked_count,
            updated_count: summaries.len(),
            skipped_count,
        });

        Ok(summaries)
    }

    /// Diff one parsed feed against the store and commit the delta
    fn apply_remote(
        &self,
        subscription: &Subscription,
        document: &FeedDocument,
    ) -> Result<Option<UpdateSummary>, StorageError> {
        let id = subscription
            .id
            .ok_or_else(|| StorageError::SubscriptionNotPersisted {
                feed_url: subscription.feed_url.clone(),
            })?;

        let local = self.store.list_episodes(id)?;
        let remote =
            Subscription::from_feed(&subscription.feed_url, &subscription.image_url, document)
                .episodes;
        let plan = create_sync_plan(remote, &LocalState::from_episodes(&local));

        self.reporter.report(ProgressEvent::FeedParsed {
            podcast_title: subscription.title.clone(),
            total_episodes: plan.total_episodes,
            new_episodes: plan.new_episodes.len(),
        });

        if plan.new_episodes.is_empty() {
            return Ok(None);
        }

        let mut new_episodes = plan.new_episodes;
        for episode in &mut new_episodes {
            episode.subscription_id = Some(id);
        }
        let new_count = self.store.insert_episodes(id, &new_episodes)?;

        Ok(Some(UpdateSummary {
            feed_url: subscription.feed_url.clone(),
            title: subscription.title.clone(),
            new_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::http::HttpResponse;
    use crate::progress::{NoopReporter, ProgressReporter};
    use crate::store::SqliteStore;

    const FEED_A: &str = "https://a.example.com/feed.xml";
    const FEED_B: &str = "https://b.example.com/feed.xml";

    #[derive(Clone, Default)]
    struct MockHttpClient {
        responses: Arc<Mutex<HashMap<String, (u16, String)>>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockHttpClient {
        fn serve(&self, url: &str, status: u16, body: impl Into<String>) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), (status, body.into()));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (status, body) = {
                let responses = self.responses.lock().unwrap();
                responses
                    .get(url)
                    .cloned()
                    .unwrap_or((404, "not found".to_string()))
            };
            Ok(HttpResponse {
                status,
                body: Bytes::from(body),
            })
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingReporter {
        fn skipped(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    ProgressEvent::FeedSkipped { url, .. } => Some(url.clone()),
                    _ => None,
                })
                .collect()
        }

        fn added(&self) -> Vec<UpdateSummary> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|event| match event {
                    ProgressEvent::EpisodesAdded(summary) => Some(summary.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn feed_xml(title: &str, guids: &[&str]) -> String {
        let items: String = guids
            .iter()
            .map(|guid| {
                format!(
                    r#"<item>
      <title>Episode {guid}</title>
      <guid>{guid}</guid>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <enclosure url="https://example.com/{guid}.mp3" type="audio/mpeg"/>
    </item>"#
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>{title}</title>
    <description>About {title}</description>
    {items}
  </channel>
</rss>"#
        )
    }

    fn engine(client: MockHttpClient) -> SyncEngine<MockHttpClient, SqliteStore> {
        SyncEngine::new(client, SqliteStore::in_memory().unwrap(), NoopReporter::shared())
    }

    fn engine_with_reporter(
        client: MockHttpClient,
        reporter: Arc<RecordingReporter>,
    ) -> SyncEngine<MockHttpClient, SqliteStore> {
        SyncEngine::new(client, SqliteStore::in_memory().unwrap(), reporter)
    }

    async fn subscribe(engine: &SyncEngine<MockHttpClient, SqliteStore>, url: &str) {
        let mut subscription = engine.get_podcast(url).await.unwrap().unwrap();
        engine.save(&mut subscription).unwrap();
    }

    #[tokio::test]
    async fn get_podcast_fetches_unsaved_subscription() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let engine = engine(client);

        let subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();

        assert_eq!(subscription.title, "Show A");
        assert_eq!(subscription.feed_url, FEED_A);
        assert!(subscription.id.is_none());
        assert_eq!(subscription.episodes.len(), 2);
        assert!(engine.list_subscriptions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_podcast_reads_saved_subscription_without_network() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let engine = engine(client.clone());
        subscribe(&engine, FEED_A).await;
        let calls_after_subscribe = client.calls();

        client.serve(FEED_A, 500, "down");
        let subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();

        assert_eq!(client.calls(), calls_after_subscribe);
        assert!(subscription.id.is_some());
        assert_eq!(subscription.episodes.len(), 2);
    }

    #[tokio::test]
    async fn get_podcast_returns_none_on_server_error() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 500, "internal error");
        let reporter = Arc::new(RecordingReporter::default());
        let engine = engine_with_reporter(client, reporter.clone());

        let result = engine.get_podcast(FEED_A).await.unwrap();

        assert!(result.is_none());
        assert!(engine.list_subscriptions().unwrap().is_empty());
        assert_eq!(reporter.skipped(), vec![FEED_A.to_string()]);
    }

    #[tokio::test]
    async fn get_podcast_returns_none_for_malformed_feed() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, "<rss><channel><title>Broken</channel>");
        let engine = engine(client);

        assert!(engine.get_podcast(FEED_A).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_description_falls_back_to_summary() {
        let client = MockHttpClient::default();
        client.serve(
            FEED_A,
            200,
            r#"<rss><channel>
  <title>Quiet</title>
  <description></description>
  <itunes:summary>x</itunes:summary>
</channel></rss>"#,
        );
        let engine = engine(client);

        let subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        assert_eq!(subscription.description, "x");
    }

    #[tokio::test]
    async fn save_assigns_ids_to_subscription_and_episodes() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let engine = engine(client);

        let mut subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        let id = engine.save(&mut subscription).unwrap();

        assert_eq!(subscription.id, Some(id));
        assert!(
            subscription
                .episodes
                .iter()
                .all(|e| e.subscription_id == Some(id))
        );
        assert_eq!(engine.episodes_for(&subscription).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn save_uses_refresh_identity_rules() {
        let client = MockHttpClient::default();
        client.serve(
            FEED_A,
            200,
            r#"<rss><channel>
  <title>Show A</title>
  <item><title>NoId 1</title></item>
  <item><title>NoId 2</title></item>
  <item><title>First</title><guid>dup</guid></item>
  <item><title>Second</title><guid>dup</guid></item>
  <item><title>Other</title><guid>other</guid></item>
</channel></rss>"#,
        );
        let engine = engine(client.clone());

        let mut subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        let id = engine.save(&mut subscription).unwrap();

        let titles: Vec<_> = subscription
            .episodes
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["First", "Other"]);

        let stored = engine.store().list_episodes(id).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|e| !e.guid.is_empty()));
        let dup = stored.iter().find(|e| e.guid == "dup").unwrap();
        assert_eq!(dup.title, "First");

        // A refresh of the unchanged feed finds nothing new
        assert!(engine.update_all_subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn artwork_set_before_save_is_stored() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        let engine = engine(client);

        let mut subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        assert_eq!(subscription.image_url, "");
        subscription.image_url = "https://a.example.com/art100.jpg".to_string();
        engine.save(&mut subscription).unwrap();

        let stored = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        assert_eq!(stored.image_url, "https://a.example.com/art100.jpg");
    }

    #[tokio::test]
    async fn saving_twice_reports_duplicate() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        let engine = engine(client);

        let mut first = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        let mut second = first.clone();
        engine.save(&mut first).unwrap();

        let err = engine.save(&mut second).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Storage(StorageError::DuplicateFeed { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_subscription_and_episodes() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let engine = engine(client);

        let mut subscription = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        let id = engine.save(&mut subscription).unwrap();
        engine.delete(&subscription).unwrap();

        assert!(engine.list_subscriptions().unwrap().is_empty());
        assert!(engine.store().list_episodes(id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_stores_only_new_episodes() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let reporter = Arc::new(RecordingReporter::default());
        let engine = engine_with_reporter(client.clone(), reporter.clone());
        subscribe(&engine, FEED_A).await;

        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b", "c"]));
        let summaries = engine.update_all_subscriptions().await.unwrap();

        assert_eq!(
            summaries,
            vec![UpdateSummary {
                feed_url: FEED_A.to_string(),
                title: "Show A".to_string(),
                new_count: 1,
            }]
        );
        assert_eq!(reporter.added(), summaries);

        let saved = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        let mut guids: Vec<_> = saved.episodes.iter().map(|e| e.guid.as_str()).collect();
        guids.sort();
        assert_eq!(guids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn repeated_update_is_idempotent() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        let engine = engine(client.clone());
        subscribe(&engine, FEED_A).await;

        client.serve(FEED_A, 200, feed_xml("Show A", &["a", "b"]));
        let first = engine.update_all_subscriptions().await.unwrap();
        let second = engine.update_all_subscriptions().await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        let id = engine
            .store()
            .find_subscription_by_url(FEED_A)
            .unwrap()
            .unwrap()
            .id
            .unwrap();
        assert_eq!(engine.store().list_episodes(id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn edited_episodes_are_not_reinserted() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        let engine = engine(client.clone());
        subscribe(&engine, FEED_A).await;

        client.serve(
            FEED_A,
            200,
            feed_xml("Show A", &["a"]).replace("Episode a", "Episode a (remastered)"),
        );

        assert!(engine.update_all_subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_feed_does_not_block_others() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        client.serve(FEED_B, 200, feed_xml("Show B", &["x"]));
        let reporter = Arc::new(RecordingReporter::default());
        let engine = engine_with_reporter(client.clone(), reporter.clone())
            .with_options(SyncOptions {
                max_concurrent_fetches: 1,
            });
        subscribe(&engine, FEED_A).await;
        subscribe(&engine, FEED_B).await;

        client.serve(FEED_A, 500, "down");
        client.serve(FEED_B, 200, feed_xml("Show B", &["x", "y"]));
        let summaries = engine.update_all_subscriptions().await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].feed_url, FEED_B);
        assert!(reporter.skipped().contains(&FEED_A.to_string()));
    }

    #[tokio::test]
    async fn malformed_refresh_writes_nothing() {
        let client = MockHttpClient::default();
        client.serve(FEED_A, 200, feed_xml("Show A", &["a"]));
        let engine = engine(client.clone());
        subscribe(&engine, FEED_A).await;

        // Truncated mid-document: the new item must not be stored
        let full = feed_xml("Show A", &["a", "b"]);
        client.serve(FEED_A, 200, &full[..full.len() - 20]);

        assert!(engine.update_all_subscriptions().await.unwrap().is_empty());
        let saved = engine.get_podcast(FEED_A).await.unwrap().unwrap();
        assert_eq!(saved.episodes.len(), 1);
    }

    #[tokio::test]
    async fn update_with_no_subscriptions_is_empty() {
        let engine = engine(MockHttpClient::default());
        assert!(engine.update_all_subscriptions().await.unwrap().is_empty());
    }
}
