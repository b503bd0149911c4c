//! Turn orchestrator
//!
//! Wires the synthesis and playback stages together for one turn, owns the
//! cancellation token, and turns the two stage reports into a `TurnResult`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use voicechain_config::{PipelineSettings, SpeakMode};
use voicechain_core::{
    FragmentStream, MemoryHook, Player, Synthesizer, TurnOutcome, TurnResult, TurnTimings,
};

use crate::cancel::CancelToken;
use crate::playback::PlaybackStage;
use crate::synthesis::SynthesisStage;
use crate::PipelineError;

/// Outcome of one speak-mode run, before the orchestrator folds in the
/// token state
struct ModeRun {
    full_text: String,
    interrupted: bool,
    first_synthesis: Option<Duration>,
    first_playback: Option<Duration>,
}

/// One-conversation-at-a-time speech pipeline
///
/// Restartable between turns; cancellation is scoped to the in-flight turn
/// and cleared before the next one starts.
pub struct SpeechChain {
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn Player>,
    memory: Arc<dyn MemoryHook>,
    settings: PipelineSettings,
    token: CancelToken,
    heard: Arc<Mutex<String>>,
}

impl SpeechChain {
    /// Create a chain around the external collaborators
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn Player>,
        memory: Arc<dyn MemoryHook>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            synthesizer,
            player,
            memory,
            settings,
            token: CancelToken::new(),
            heard: Arc::new(Mutex::new(String::new())),
        }
    }

    /// A clone of the per-turn cancellation token, for external wiring
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Text spoken so far in the current turn
    pub fn heard_text(&self) -> String {
        self.heard.lock().clone()
    }

    /// Cancel the in-flight turn and forward the heard-so-far transcript to
    /// the language model's memory hook.
    ///
    /// Callable concurrently from outside the turn; concurrent calls
    /// collapse to one and the hook fires once per cancelled turn.
    pub async fn interrupt(&self) {
        if self.token.cancel() {
            let heard = self.heard.lock().clone();
            debug!(heard = %heard, "turn interrupted");
            self.memory.on_interrupt(&heard).await;
        }
    }

    /// Run one turn over a fragment source.
    ///
    /// Returns `Err(GuardTimeout)` when a previous cancellation's cleanup
    /// never reset the token within the guard window; an interruption is a
    /// normal `TurnOutcome::Interrupted` result, not an error.
    pub async fn run_turn(&self, fragments: FragmentStream) -> Result<TurnResult, PipelineError> {
        let guard = Duration::from_millis(self.settings.guard_timeout_ms);
        if !self.token.await_runnable(guard).await {
            warn!(
                timeout_ms = self.settings.guard_timeout_ms,
                "token still cancelled, refusing to start turn"
            );
            return Err(PipelineError::GuardTimeout(self.settings.guard_timeout_ms));
        }

        self.heard.lock().clear();
        let turn_start = Instant::now();

        let run = match self.settings.speak_mode {
            SpeakMode::SentenceChain => self.run_sentence_chain(fragments, turn_start).await?,
            SpeakMode::FullResponse => self.run_full_response(fragments, turn_start).await,
        };

        let interrupted = run.interrupted || !self.token.is_runnable();
        let outcome = if interrupted {
            // Interrupt post-processing: clear the cancellation so the next
            // turn starts clean.
            self.token.reset();
            TurnOutcome::Interrupted
        } else {
            TurnOutcome::Completed
        };

        let timings = TurnTimings {
            first_synthesis: run.first_synthesis,
            first_playback: run.first_playback,
            total: turn_start.elapsed(),
        };

        if self.settings.show_timing {
            info!(
                first_synthesis_ms = timings.first_synthesis.map(|d| d.as_millis() as u64),
                first_playback_ms = timings.first_playback.map(|d| d.as_millis() as u64),
                total_ms = timings.total.as_millis() as u64,
                ?outcome,
                "turn finished"
            );
        }

        Ok(TurnResult {
            full_text: run.full_text,
            heard_text: self.heard.lock().clone(),
            outcome,
            timings,
        })
    }

    /// Sentence-by-sentence mode: producer and consumer run concurrently,
    /// joined by the bounded hand-off channel.
    async fn run_sentence_chain(
        &self,
        fragments: FragmentStream,
        turn_start: Instant,
    ) -> Result<ModeRun, PipelineError> {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity);

        let producer = SynthesisStage::new(
            self.synthesizer.clone(),
            self.player.clone(),
            self.token.clone(),
            self.settings.verbose,
        );
        let consumer = PlaybackStage::new(
            self.player.clone(),
            self.token.clone(),
            self.heard.clone(),
            Duration::from_millis(self.settings.queue_poll_ms),
        );

        let produce = tokio::spawn(producer.run(fragments, tx, turn_start));
        let play = tokio::spawn(consumer.run(rx, turn_start));

        // Join semantics, no timeout: cancellation, not a deadline, is what
        // stops a runaway stage.
        let (produce, play) = tokio::join!(produce, play);
        let synthesis = produce.map_err(|e| PipelineError::Stage(e.to_string()))?;
        let playback = play.map_err(|e| PipelineError::Stage(e.to_string()))?;

        Ok(ModeRun {
            full_text: synthesis.full_text,
            interrupted: synthesis.interrupted || playback.interrupted,
            first_synthesis: synthesis.first_synthesis,
            first_playback: playback.first_playback,
        })
    }

    /// Speak-everything-at-once mode: buffer the whole stream, synthesize
    /// once, play once. Still honors cancellation between fragments.
    async fn run_full_response(
        &self,
        mut fragments: FragmentStream,
        turn_start: Instant,
    ) -> ModeRun {
        let mut run = ModeRun {
            full_text: String::new(),
            interrupted: false,
            first_synthesis: None,
            first_playback: None,
        };

        loop {
            if !self.token.is_runnable() {
                run.interrupted = true;
                return run;
            }
            let Some(fragment) = fragments.next().await else {
                break;
            };
            run.full_text.push_str(&fragment);
        }

        if run.full_text.trim().is_empty() {
            return run;
        }

        if !self.token.is_runnable() {
            run.interrupted = true;
            return run;
        }

        let audio = match self.synthesizer.synthesize(&run.full_text).await {
            Ok(audio) => audio,
            Err(err) => {
                warn!(%err, "synthesis failed for full response");
                return run;
            }
        };
        run.first_synthesis = Some(turn_start.elapsed());

        if !self.token.is_runnable() {
            if let Some(audio) = &audio {
                self.player.release(audio).await;
            }
            run.interrupted = true;
            return run;
        }

        match &audio {
            Some(audio) => {
                run.first_playback = Some(turn_start.elapsed());
                self.heard.lock().push_str(&run.full_text);
                if let Err(err) = self.player.play(audio).await {
                    warn!(%err, "playback failed for full response");
                }
                self.player.release(audio).await;
            }
            None => debug!("synthesizer produced no audio for full response"),
        }

        run
    }
}
