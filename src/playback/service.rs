// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::PlaybackError;

use super::controller::{PlaybackCommand, PlaybackController};
use super::player::{AudioFocus, MediaPlayer, PlaybackSnapshot};

type Reply = oneshot::Sender<Result<PlaybackSnapshot, PlaybackError>>;

/// Number of commands that may queue up before senders wait
const COMMAND_BUFFER: usize = 16;

/// Runs a playback controller on its own thread
///
/// Commands are handled one at a time in the order they were sent, so a
/// blocking prepare delays later commands but never the caller's task.
pub struct PlaybackService<P, A> {
    commands: mpsc::Sender<(PlaybackCommand, Reply)>,
    worker: JoinHandle<PlaybackController<P, A>>,
}

impl<P, A> PlaybackService<P, A>
where
    P: MediaPlayer + 'static,
    A: AudioFocus + 'static,
{
    pub fn spawn(mut controller: PlaybackController<P, A>) -> io::Result<Self> {
        let (commands, mut receiver) = mpsc::channel::<(PlaybackCommand, Reply)>(COMMAND_BUFFER);

        let worker = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                while let Some((command, reply)) = receiver.blocking_recv() {
                    debug!(?command, "playback command");
                    // Caller may have stopped waiting
                    let _ = reply.send(controller.handle(command));
                }
                controller.release();
                controller
            })?;

        Ok(Self { commands, worker })
    }

    /// Queue a command and wait for its result
    pub async fn send(&self, command: PlaybackCommand) -> Result<PlaybackSnapshot, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send((command, reply))
            .await
            .map_err(|_| PlaybackError::ServiceStopped)?;
        response.await.map_err(|_| PlaybackError::ServiceStopped)?
    }

    /// Stop accepting commands, release the player and hand back the
    /// controller
    pub async fn shutdown(self) -> Result<PlaybackController<P, A>, PlaybackError> {
        let Self { commands, worker } = self;
        drop(commands);

        tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|_| PlaybackError::ServiceStopped)?
            .map_err(|_| PlaybackError::ServiceStopped)
    }
}
