//! Synthesis stage (producer)
//!
//! Consumes the fragment stream, closes sentence boundaries, synthesizes
//! audio per sentence, and emits ordered units onto the hand-off channel.
//! Checks the cancellation token before reading each fragment and on both
//! sides of every synthesis call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use voicechain_core::{FragmentStream, Player, SentenceUnit, Synthesizer};

use crate::cancel::CancelToken;
use crate::segment::is_sentence_boundary;

/// What the producer hands back to the orchestrator
pub(crate) struct SynthesisReport {
    /// Concatenation of every fragment read, even when cancellation cut
    /// speech short
    pub full_text: String,
    /// True when the stage stopped because the token was cancelled
    pub interrupted: bool,
    /// Time from turn start to the first finished synthesis call
    pub first_synthesis: Option<Duration>,
}

/// Outcome of one synthesize-and-emit attempt
enum Emit {
    /// Unit is on the channel
    Sent,
    /// Sentence dropped (synthesis failure or empty buffer); the turn
    /// continues
    Dropped,
    /// Cancellation observed; the stage must wind down
    Cancelled,
    /// Receiver went away; nothing left to emit to
    Closed,
}

pub(crate) struct SynthesisStage {
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
    token: CancelToken,
    verbose: bool,
}

impl SynthesisStage {
    pub(crate) fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn Player>,
        token: CancelToken,
        verbose: bool,
    ) -> Self {
        Self {
            synthesizer,
            player,
            token,
            verbose,
        }
    }

    /// Run the stage to completion or cancellation.
    ///
    /// The channel sender is owned here and dropped on every exit path, so
    /// the playback stage always observes termination.
    pub(crate) async fn run(
        self,
        mut fragments: FragmentStream,
        tx: mpsc::Sender<SentenceUnit>,
        turn_start: Instant,
    ) -> SynthesisReport {
        let mut buffer = String::new();
        let mut full_text = String::new();
        let mut index = 0usize;
        let mut first_synthesis = None;
        let mut interrupted = false;

        loop {
            if !self.token.is_runnable() {
                interrupted = true;
                break;
            }

            let Some(fragment) = fragments.next().await else {
                break;
            };
            if fragment.is_empty() {
                continue;
            }

            buffer.push_str(&fragment);
            full_text.push_str(&fragment);

            if !is_sentence_boundary(&buffer) {
                continue;
            }

            if self.verbose {
                debug!(index, sentence = %buffer, "sentence boundary closed");
            }

            match self
                .synthesize_and_emit(&buffer, index, &tx, turn_start, &mut first_synthesis)
                .await
            {
                Emit::Sent => {
                    index += 1;
                    buffer.clear();
                }
                Emit::Dropped => buffer.clear(),
                Emit::Cancelled => {
                    interrupted = true;
                    break;
                }
                Emit::Closed => break,
            }
        }

        // A stream that ends without terminal punctuation still gets spoken:
        // the residual buffer becomes one final unit.
        if !interrupted && !buffer.is_empty() {
            if let Emit::Cancelled = self
                .synthesize_and_emit(&buffer, index, &tx, turn_start, &mut first_synthesis)
                .await
            {
                interrupted = true;
            }
        }

        SynthesisReport {
            full_text,
            interrupted,
            first_synthesis,
        }
    }

    async fn synthesize_and_emit(
        &self,
        text: &str,
        index: usize,
        tx: &mpsc::Sender<SentenceUnit>,
        turn_start: Instant,
        first_synthesis: &mut Option<Duration>,
    ) -> Emit {
        // Cannot happen through the segmenter, but an empty sentence is a
        // no-op rather than an error.
        if text.trim().is_empty() {
            return Emit::Dropped;
        }

        if !self.token.is_runnable() {
            return Emit::Cancelled;
        }

        let audio = match self.synthesizer.synthesize(text).await {
            Ok(audio) => audio,
            Err(err) => {
                warn!(%err, sentence = text, "synthesis failed, dropping sentence");
                return Emit::Dropped;
            }
        };

        first_synthesis.get_or_insert_with(|| turn_start.elapsed());

        if audio.is_none() {
            debug!(index, "synthesizer produced no audio, nothing to play");
        }

        // A cancellation that arrived mid-synthesis stops this unit from
        // propagating; its audio is abandoned and released here.
        if !self.token.is_runnable() {
            if let Some(audio) = &audio {
                self.player.release(audio).await;
            }
            return Emit::Cancelled;
        }

        let unit = SentenceUnit {
            index,
            text: text.to_string(),
            audio,
        };

        if let Err(err) = tx.send(unit).await {
            if let Some(audio) = &err.0.audio {
                self.player.release(audio).await;
            }
            return Emit::Closed;
        }

        Emit::Sent
    }
}
