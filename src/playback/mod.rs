mod controller;
mod player;
mod service;

pub use controller::{PlaybackCommand, PlaybackController};
pub use player::{
    AudioFocus, MediaMetadata, MediaPlayer, MediaSession, PlaybackObserver, PlaybackSnapshot,
    PlaybackState, PlayerFactory, SharedPlaybackObserver,
};
pub use service::PlaybackService;
