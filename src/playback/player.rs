// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use serde::Serialize;

use crate::error::PlayerFault;

/// Lifecycle of the loaded media resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    /// Nothing loaded
    Idle,
    /// Resource is being bound and prepared
    Preparing,
    Playing,
    Paused,
    /// Playback ended by the user; the next play re-prepares
    Stopped,
}

/// What observers learn on every published change
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub position_ms: u64,
    pub rate: f32,
}

/// Display metadata for the current item
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: String,
    pub artwork_ref: String,
    /// Filled in from the player once the resource is prepared
    pub duration_ms: Option<u64>,
}

/// Platform media player
///
/// `prepare` blocks until the resource is ready to play.
pub trait MediaPlayer: Send {
    fn reset(&mut self);
    fn set_data_source(&mut self, uri: &str) -> Result<(), PlayerFault>;
    fn prepare(&mut self) -> Result<(), PlayerFault>;
    fn start(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek_to(&mut self, position_ms: u64);
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> Option<u64>;
    fn is_playing(&self) -> bool;
    /// May fail on a live resource, which then has to be rebuilt
    fn set_rate(&mut self, rate: f32) -> Result<(), PlayerFault>;
    fn rate(&self) -> f32;
}

/// Platform audio policy granting exclusive playback
pub trait AudioFocus: Send {
    /// Ask for exclusive focus; `false` means denied
    fn request_gain(&mut self) -> bool;
    fn abandon(&mut self);
}

/// Receives state and metadata changes from the controller
pub trait PlaybackObserver: Send + Sync {
    fn on_state(&self, snapshot: &PlaybackSnapshot);
    fn on_metadata(&self, metadata: &MediaMetadata);
}

pub type SharedPlaybackObserver = Arc<dyn PlaybackObserver>;

/// Builds the player the first time one is needed
pub type PlayerFactory<P> = Box<dyn FnMut() -> P + Send>;

/// What the controller last told the outside world
#[derive(Debug, Clone, Default)]
pub struct MediaSession {
    active: bool,
    snapshot: Option<PlaybackSnapshot>,
    metadata: Option<MediaMetadata>,
}

impl MediaSession {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn snapshot(&self) -> Option<PlaybackSnapshot> {
        self.snapshot
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_snapshot(&mut self, snapshot: PlaybackSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub(crate) fn set_metadata(&mut self, metadata: MediaMetadata) {
        self.metadata = Some(metadata);
    }
}
