// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, info, warn};

use crate::error::{PlaybackError, PlayerFault};

use super::player::{
    AudioFocus, MediaMetadata, MediaPlayer, MediaSession, PlaybackSnapshot, PlaybackState,
    PlayerFactory, SharedPlaybackObserver,
};

/// Transport commands accepted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    PlayFromUri { uri: String, metadata: MediaMetadata },
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    ChangeSpeed(f32),
    /// The player reached the end of the media
    Completed,
}

/// State machine driving one media player
///
/// Commands must arrive serialized; the controller does no locking of its
/// own. `play` may block while the resource prepares, so run it off any
/// latency-sensitive thread (see `PlaybackService`).
pub struct PlaybackController<P, A> {
    factory: PlayerFactory<P>,
    player: Option<P>,
    focus: A,
    holds_focus: bool,
    observers: Vec<SharedPlaybackObserver>,
    session: MediaSession,
    state: PlaybackState,
    uri: Option<String>,
    needs_prepare: bool,
    pending_metadata: Option<MediaMetadata>,
    rate: f32,
}

/// Reset the player and load `uri`, blocking until it is ready
fn bind<P: MediaPlayer>(player: &mut P, uri: &str) -> Result<(), PlayerFault> {
    player.reset();
    player.set_data_source(uri)?;
    player.prepare()
}

impl<P: MediaPlayer, A: AudioFocus> PlaybackController<P, A> {
    pub fn new(factory: impl FnMut() -> P + Send + 'static, focus: A) -> Self {
        Self {
            factory: Box::new(factory),
            player: None,
            focus,
            holds_focus: false,
            observers: Vec::new(),
            session: MediaSession::default(),
            state: PlaybackState::Idle,
            uri: None,
            needs_prepare: true,
            pending_metadata: None,
            rate: 1.0,
        }
    }

    pub fn add_observer(&mut self, observer: SharedPlaybackObserver) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn current_uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn session(&self) -> &MediaSession {
        &self.session
    }

    pub fn position_ms(&self) -> u64 {
        self.player.as_ref().map_or(0, |player| player.position_ms())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            position_ms: self.position_ms(),
            rate: self.rate,
        }
    }

    /// Dispatch one command and return the resulting snapshot
    pub fn handle(&mut self, command: PlaybackCommand) -> Result<PlaybackSnapshot, PlaybackError> {
        match command {
            PlaybackCommand::PlayFromUri { uri, metadata } => self.play_from_uri(&uri, metadata)?,
            PlaybackCommand::Play => self.play()?,
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Stop => self.stop(),
            PlaybackCommand::SeekTo(position_ms) => self.seek_to(position_ms),
            PlaybackCommand::ChangeSpeed(rate) => self.change_speed(rate)?,
            PlaybackCommand::Completed => self.on_completion(),
        }
        Ok(self.snapshot())
    }

    /// Play `uri`, loading it first unless it is already the current media
    ///
    /// For the current media this is a plain resume and `metadata` is
    /// ignored.
    pub fn play_from_uri(&mut self, uri: &str, metadata: MediaMetadata) -> Result<(), PlaybackError> {
        if self.uri.as_deref() == Some(uri) {
            debug!(uri, "resuming current media");
        } else {
            self.uri = Some(uri.to_string());
            self.pending_metadata = Some(metadata);
            self.needs_prepare = true;
        }
        self.play()
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.acquire_focus() {
            warn!("audio focus denied");
            return Err(PlaybackError::FocusDenied);
        }

        let Some(uri) = self.uri.clone() else {
            self.release_focus();
            return Err(PlaybackError::NoMedia);
        };

        self.session.set_active(true);
        if self.needs_prepare {
            self.prepare(&uri)?;
        }

        let player = self.player.get_or_insert_with(|| (self.factory)());
        player.start();
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) {
        self.release_focus();
        if let Some(player) = self.player.as_mut()
            && player.is_playing()
        {
            player.pause();
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn stop(&mut self) {
        self.release_focus();
        self.session.set_active(false);
        if let Some(player) = self.player.as_mut()
            && player.is_playing()
        {
            player.stop();
        }
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            self.needs_prepare = true;
            self.set_state(PlaybackState::Stopped);
        }
    }

    /// Move to an absolute position without changing play/pause state
    pub fn seek_to(&mut self, position_ms: u64) {
        if let Some(player) = self.player.as_mut() {
            player.seek_to(position_ms);
            self.publish_state();
        }
    }

    /// Change the playback rate, rebuilding the resource if the player
    /// rejects it
    ///
    /// With nothing loaded the rate is kept and applied after the next
    /// prepare.
    pub fn change_speed(&mut self, rate: f32) -> Result<(), PlaybackError> {
        self.rate = rate;
        if self.needs_prepare {
            return Ok(());
        }
        let Some(player) = self.player.as_mut() else {
            return Ok(());
        };

        let position_ms = player.position_ms();
        match player.set_rate(rate) {
            Ok(()) => {
                self.publish_state();
                Ok(())
            }
            Err(fault) => {
                warn!(rate, error = %fault, "rate change failed, rebuilding player");
                self.recover(rate, position_ms)
            }
        }
    }

    /// The player reached the end of the media
    ///
    /// Moves to `Paused` at the end position. The player, session and
    /// audio focus are all kept.
    pub fn on_completion(&mut self) {
        if let Some(player) = self.player.as_mut()
            && player.is_playing()
        {
            player.pause();
        }
        if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Paused);
        }
    }

    /// Stop playback and drop the player
    pub fn release(&mut self) {
        self.stop();
        if let Some(mut player) = self.player.take() {
            player.reset();
        }
        self.state = PlaybackState::Idle;
        self.uri = None;
        self.pending_metadata = None;
        self.needs_prepare = true;
    }

    fn prepare(&mut self, uri: &str) -> Result<(), PlaybackError> {
        self.state = PlaybackState::Preparing;
        let player = self.player.get_or_insert_with(|| (self.factory)());

        if let Err(fault) = bind(player, uri) {
            return Err(self.fault(uri, fault));
        }
        self.needs_prepare = false;

        if player.rate() != self.rate
            && let Err(fault) = player.set_rate(self.rate)
        {
            warn!(rate = self.rate, error = %fault, "could not apply playback rate");
        }

        let duration_ms = player.duration_ms();
        if let Some(mut metadata) = self.pending_metadata.take() {
            metadata.duration_ms = duration_ms;
            self.publish_metadata(metadata);
        }
        info!(uri, "media prepared");
        Ok(())
    }

    fn recover(&mut self, rate: f32, position_ms: u64) -> Result<(), PlaybackError> {
        let Some(uri) = self.uri.clone() else {
            return Err(PlaybackError::NoMedia);
        };
        let resume = self.state == PlaybackState::Playing;
        let Some(player) = self.player.as_mut() else {
            return Err(PlaybackError::NoMedia);
        };

        if let Err(fault) = bind(player, &uri).and_then(|()| player.set_rate(rate)) {
            return Err(self.fault(&uri, fault));
        }
        player.seek_to(position_ms);
        if resume {
            player.start();
        }

        info!(uri, position_ms, rate, "player rebuilt after fault");
        self.publish_state();
        Ok(())
    }

    fn fault(&mut self, uri: &str, fault: PlayerFault) -> PlaybackError {
        warn!(uri, error = %fault, "playback resource fault");
        if let Some(player) = self.player.as_mut() {
            player.reset();
        }
        self.state = PlaybackState::Idle;
        self.needs_prepare = true;
        self.session.set_active(false);
        self.release_focus();
        PlaybackError::ResourceFault {
            uri: uri.to_string(),
            source: fault,
        }
    }

    fn acquire_focus(&mut self) -> bool {
        if !self.holds_focus {
            self.holds_focus = self.focus.request_gain();
        }
        self.holds_focus
    }

    fn release_focus(&mut self) {
        if self.holds_focus {
            self.focus.abandon();
            self.holds_focus = false;
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.publish_state();
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        self.session.set_snapshot(snapshot);
        for observer in &self.observers {
            observer.on_state(&snapshot);
        }
    }

    fn publish_metadata(&mut self, metadata: MediaMetadata) {
        for observer in &self.observers {
            observer.on_metadata(&metadata);
        }
        self.session.set_metadata(metadata);
    }
}
