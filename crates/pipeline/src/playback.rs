//! Playback stage (consumer)
//!
//! Drains the hand-off channel strictly in order and plays each unit.
//! Polls with a short timeout so a cancellation is observed promptly even
//! while waiting for the next unit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use voicechain_core::{Player, SentenceUnit};

use crate::cancel::CancelToken;

/// What the consumer hands back to the orchestrator
pub(crate) struct PlaybackReport {
    /// True when the stage stopped because the token was cancelled
    pub interrupted: bool,
    /// Time from turn start to the first playback starting
    pub first_playback: Option<Duration>,
}

pub(crate) struct PlaybackStage {
    player: Arc<dyn Player>,
    token: CancelToken,
    /// Running transcript of what was actually spoken; single writer (this
    /// stage), read by the orchestrator's interrupt path
    heard: Arc<Mutex<String>>,
    poll: Duration,
}

impl PlaybackStage {
    pub(crate) fn new(
        player: Arc<dyn Player>,
        token: CancelToken,
        heard: Arc<Mutex<String>>,
        poll: Duration,
    ) -> Self {
        Self {
            player,
            token,
            heard,
            poll,
        }
    }

    pub(crate) async fn run(
        self,
        mut rx: mpsc::Receiver<SentenceUnit>,
        turn_start: Instant,
    ) -> PlaybackReport {
        let mut first_playback = None;
        let mut interrupted = false;
        let mut next_index = 0usize;

        loop {
            if !self.token.is_runnable() {
                interrupted = true;
                self.drain_abandoned(&mut rx).await;
                break;
            }

            let unit = match tokio::time::timeout(self.poll, rx.recv()).await {
                // No unit yet; loop around to re-check cancellation.
                Err(_) => continue,
                // Channel terminated: normal stop.
                Ok(None) => break,
                Ok(Some(unit)) => unit,
            };

            // Queued but not-yet-played units are discarded on cancellation.
            if !self.token.is_runnable() {
                interrupted = true;
                if let Some(audio) = &unit.audio {
                    self.player.release(audio).await;
                }
                self.drain_abandoned(&mut rx).await;
                break;
            }

            if unit.index != next_index {
                warn!(
                    got = unit.index,
                    expected = next_index,
                    "sentence unit out of order"
                );
                debug_assert_eq!(unit.index, next_index);
            }
            next_index = unit.index + 1;

            // Record the sentence as heard before playing it, so a
            // concurrent interrupt reports the in-flight sentence to the
            // memory hook.
            self.heard.lock().push_str(&unit.text);

            match &unit.audio {
                Some(audio) => {
                    first_playback.get_or_insert_with(|| turn_start.elapsed());
                    if let Err(err) = self.player.play(audio).await {
                        warn!(%err, unit = unit.index, "playback failed, skipping unit");
                    }
                    self.player.release(audio).await;
                }
                None => debug!(unit = unit.index, "no audio to play"),
            }
        }

        PlaybackReport {
            interrupted,
            first_playback,
        }
    }

    /// Release whatever is still queued when the turn is abandoned.
    ///
    /// The channel is closed before draining: a producer send racing with
    /// the drain fails instead of buffering a unit nobody would release,
    /// and the producer's send-error path releases that unit's audio.
    /// Units already buffered are still yielded by `try_recv` after the
    /// close.
    async fn drain_abandoned(&self, rx: &mut mpsc::Receiver<SentenceUnit>) {
        rx.close();
        while let Ok(unit) = rx.try_recv() {
            if let Some(audio) = &unit.audio {
                self.player.release(audio).await;
            }
        }
    }
}
