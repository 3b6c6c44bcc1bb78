use std::collections::HashSet;

use crate::subscription::Episode;

/// Episodes already stored for one subscription, keyed by guid
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    /// GUIDs of episodes that are already persisted
    pub known_guids: HashSet<String>,
}

impl LocalState {
    /// Collect the guids of stored episodes
    pub fn from_episodes(episodes: &[Episode]) -> Self {
        Self {
            known_guids: episodes.iter().map(|e| e.guid.clone()).collect(),
        }
    }
}

/// Plan for synchronization, indicating what needs to be stored
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Remote episodes with no stored counterpart, in feed order
    pub new_episodes: Vec<Episode>,
    /// Remote episodes whose guid is already stored
    pub already_present: Vec<Episode>,
    /// Remote episodes that cannot be identified (no guid, no media URL)
    pub unidentified: usize,
    /// Total number of episodes in the feed
    pub total_episodes: usize,
}

/// Create a sync plan by comparing remote episodes against stored ones
///
/// Identity is the guid alone: a stored episode whose title or date
/// changed upstream is still "present". A guid repeated within the feed
/// is only counted once.
pub fn create_sync_plan(episodes: Vec<Episode>, state: &LocalState) -> SyncPlan {
    let total_episodes = episodes.len();
    let mut new_episodes = Vec::new();
    let mut already_present = Vec::new();
    let mut unidentified = 0;
    let mut seen = HashSet::new();

    for episode in episodes {
        if episode.guid.is_empty() {
            unidentified += 1;
            continue;
        }

        if state.known_guids.contains(&episode.guid) {
            already_present.push(episode);
        } else if seen.insert(episode.guid.clone()) {
            new_episodes.push(episode);
        }
    }

    SyncPlan {
        new_episodes,
        already_present,
        unidentified,
        total_episodes,
    }
}
