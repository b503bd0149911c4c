//! Integration tests for the sentence-chain pipeline
//!
//! These tests drive full turns through stub collaborators and verify
//! ordering, interruption, and failure-isolation behavior end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use voicechain_config::{PipelineSettings, SpeakMode};
use voicechain_core::{
    AudioHandle, FragmentStream, MemoryHook, Player, PlaybackError, Synthesizer, SynthesisError,
    TurnOutcome,
};
use voicechain_pipeline::{PipelineError, SpeechChain};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

/// Fragment source scripted from fixed chunks
fn fragments(parts: &[&str]) -> FragmentStream {
    let parts: Vec<String> = parts.iter().map(|s| s.to_string()).collect();
    Box::pin(tokio_stream::iter(parts))
}

struct StubSynth {
    fail_on: Option<&'static str>,
    silent: bool,
    calls: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

impl StubSynth {
    fn new() -> Self {
        Self {
            fail_on: None,
            silent: false,
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    fn failing_on(pattern: &'static str) -> Self {
        Self {
            fail_on: Some(pattern),
            ..Self::new()
        }
    }

    fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Synthesizer for StubSynth {
    async fn synthesize(&self, text: &str) -> Result<Option<AudioHandle>, SynthesisError> {
        if let Some(pattern) = self.fail_on {
            if text.contains(pattern) {
                return Err(SynthesisError::Engine("stub failure".to_string()));
            }
        }
        self.calls.lock().push(text.to_string());
        if self.silent {
            return Ok(None);
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(AudioHandle::new(format!("stub-{n}"))))
    }
}

struct StubPlayer {
    played: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    on_play: Option<Arc<Notify>>,
    play_delay: Option<Duration>,
}

impl StubPlayer {
    fn new() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            on_play: None,
            play_delay: None,
        }
    }

    fn notifying(on_play: Arc<Notify>) -> Self {
        Self {
            on_play: Some(on_play),
            ..Self::new()
        }
    }

    fn slow(on_play: Arc<Notify>, delay: Duration) -> Self {
        Self {
            on_play: Some(on_play),
            play_delay: Some(delay),
            ..Self::new()
        }
    }
}

#[async_trait]
impl Player for StubPlayer {
    async fn play(&self, audio: &AudioHandle) -> Result<(), PlaybackError> {
        self.played.lock().push(audio.as_str().to_string());
        if let Some(notify) = &self.on_play {
            notify.notify_one();
        }
        if let Some(delay) = self.play_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn release(&self, audio: &AudioHandle) {
        self.released.lock().push(audio.as_str().to_string());
    }
}

struct StubMemory {
    interrupts: Mutex<Vec<String>>,
}

impl StubMemory {
    fn new() -> Self {
        Self {
            interrupts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MemoryHook for StubMemory {
    async fn on_interrupt(&self, heard_text: &str) {
        self.interrupts.lock().push(heard_text.to_string());
    }
}

/// Three clean sentences come out in index order and the full text matches
/// the fragment concatenation
#[tokio::test]
async fn test_three_sentences_play_in_order() {
    init_tracing();
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());

    let settings = PipelineSettings {
        verbose: true,
        show_timing: true,
        ..Default::default()
    };
    let chain = SpeechChain::new(synth.clone(), player.clone(), memory.clone(), settings);

    let result = chain
        .run_turn(fragments(&["One", ". ", "Two", "! ", "Thr", "ee?"]))
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.full_text, "One. Two! Three?");
    assert_eq!(result.heard_text, "One. Two! Three?");
    assert_eq!(
        synth.calls.lock().as_slice(),
        ["One. ", "Two! ", "Three?"]
    );
    assert_eq!(
        player.played.lock().as_slice(),
        ["stub-0", "stub-1", "stub-2"]
    );
    // Every played unit was released afterward
    assert_eq!(
        player.released.lock().as_slice(),
        ["stub-0", "stub-1", "stub-2"]
    );
    assert!(result.timings.first_synthesis.is_some());
    assert!(result.timings.first_playback.is_some());
}

/// A stream that never satisfies a boundary still emits exactly one final
/// residual unit
#[tokio::test]
async fn test_residual_without_boundary() {
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());
    let chain = SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory,
        PipelineSettings::default(),
    );

    let result = chain
        .run_turn(fragments(&["Hello", " wor", "ld"]))
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.heard_text, "Hello world");
    assert_eq!(synth.calls.lock().as_slice(), ["Hello world"]);
    assert_eq!(player.played.lock().len(), 1);
}

/// Interrupting after unit 0 has played and before unit 1 is synthesized
/// truncates speech but not the recorded text, and the memory hook sees
/// exactly what was heard. The next turn then starts cleanly.
#[tokio::test]
async fn test_interrupt_after_first_unit() {
    init_tracing();
    let played = Arc::new(Notify::new());
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::notifying(played.clone()));
    let memory = Arc::new(StubMemory::new());

    let chain = Arc::new(SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory.clone(),
        PipelineSettings::default(),
    ));

    let chain_in_stream = chain.clone();
    let source: FragmentStream = Box::pin(async_stream::stream! {
        yield "One.".to_string();
        // Hold the next fragment back until unit 0 reaches the player,
        // then interrupt mid-generation.
        played.notified().await;
        chain_in_stream.interrupt().await;
        yield " Two.".to_string();
    });

    let result = chain.run_turn(source).await.unwrap();

    assert_eq!(result.outcome, TurnOutcome::Interrupted);
    // Speech was truncated...
    assert_eq!(result.heard_text, "One.");
    assert_eq!(synth.calls.lock().as_slice(), ["One."]);
    assert_eq!(player.played.lock().len(), 1);
    // ...but the recorded text keeps everything the model emitted
    assert_eq!(result.full_text, "One. Two.");
    // The memory hook fired once, with the heard transcript
    assert_eq!(memory.interrupts.lock().as_slice(), ["One."]);

    // Post-processing reset the token: a new turn starts without delay
    let again = chain.run_turn(fragments(&["Again."])).await.unwrap();
    assert_eq!(again.outcome, TurnOutcome::Completed);
    assert_eq!(again.heard_text, "Again.");
}

/// Units queued behind a slow playback are abandoned and released on
/// interrupt, never played
#[tokio::test]
async fn test_queued_units_released_on_interrupt() {
    let played = Arc::new(Notify::new());
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::slow(played.clone(), Duration::from_millis(100)));
    let memory = Arc::new(StubMemory::new());

    let chain = Arc::new(SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory.clone(),
        PipelineSettings::default(),
    ));

    let interrupter = chain.clone();
    let trigger = tokio::spawn(async move {
        played.notified().await;
        interrupter.interrupt().await;
    });

    let result = chain
        .run_turn(fragments(&["One. ", "Two. ", "Three."]))
        .await
        .unwrap();
    trigger.await.unwrap();

    assert_eq!(result.outcome, TurnOutcome::Interrupted);
    assert_eq!(result.heard_text, "One. ");
    assert_eq!(player.played.lock().as_slice(), ["stub-0"]);
    // All three handles were destroyed: one after playback, two abandoned
    let mut released = player.released.lock().clone();
    released.sort();
    assert_eq!(released, ["stub-0", "stub-1", "stub-2"]);
}

/// One failed synthesis drops that sentence only; later sentences keep
/// their gapless ordering and still play
#[tokio::test]
async fn test_synthesis_failure_skips_sentence() {
    let synth = Arc::new(StubSynth::failing_on("Two"));
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());
    let chain = SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory,
        PipelineSettings::default(),
    );

    let result = chain
        .run_turn(fragments(&["One. ", "Two! ", "Three."]))
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.full_text, "One. Two! Three.");
    assert_eq!(result.heard_text, "One. Three.");
    assert_eq!(player.played.lock().as_slice(), ["stub-0", "stub-1"]);
}

/// The empty-audio condition is not an error: the text still counts as
/// heard, nothing is played
#[tokio::test]
async fn test_empty_audio_units_still_heard() {
    let synth = Arc::new(StubSynth::silent());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());
    let chain = SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory,
        PipelineSettings::default(),
    );

    let result = chain
        .run_turn(fragments(&["Hi.", " There."]))
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.heard_text, "Hi. There.");
    assert!(player.played.lock().is_empty());
    assert!(result.timings.first_playback.is_none());
    assert!(result.timings.first_synthesis.is_some());
}

/// Full-response mode buffers everything, then synthesizes and plays once
#[tokio::test]
async fn test_full_response_mode() {
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());

    let settings = PipelineSettings {
        speak_mode: SpeakMode::FullResponse,
        ..Default::default()
    };
    let chain = SpeechChain::new(synth.clone(), player.clone(), memory, settings);

    let result = chain
        .run_turn(fragments(&["All ", "at ", "once."]))
        .await
        .unwrap();

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(synth.calls.lock().as_slice(), ["All at once."]);
    assert_eq!(player.played.lock().len(), 1);
    assert_eq!(result.heard_text, "All at once.");
}

/// Full-response mode still observes cancellation during accumulation and
/// never synthesizes
#[tokio::test]
async fn test_full_response_interrupt_during_accumulation() {
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());

    let settings = PipelineSettings {
        speak_mode: SpeakMode::FullResponse,
        ..Default::default()
    };
    let chain = Arc::new(SpeechChain::new(
        synth.clone(),
        player.clone(),
        memory.clone(),
        settings,
    ));

    let chain_in_stream = chain.clone();
    let source: FragmentStream = Box::pin(async_stream::stream! {
        yield "Start".to_string();
        chain_in_stream.interrupt().await;
        yield " more".to_string();
    });

    let result = chain.run_turn(source).await.unwrap();

    assert_eq!(result.outcome, TurnOutcome::Interrupted);
    assert!(synth.calls.lock().is_empty());
    assert!(player.played.lock().is_empty());
    assert_eq!(result.heard_text, "");
    // Nothing was heard, and the hook was told so
    assert_eq!(memory.interrupts.lock().as_slice(), [""]);
}

/// A token stuck in the cancelled state fails the turn with a guard
/// timeout, distinct from a normal interruption
#[tokio::test]
async fn test_guard_timeout_is_turn_fatal() {
    let synth = Arc::new(StubSynth::new());
    let player = Arc::new(StubPlayer::new());
    let memory = Arc::new(StubMemory::new());

    let settings = PipelineSettings {
        guard_timeout_ms: 50,
        ..Default::default()
    };
    let chain = SpeechChain::new(synth, player.clone(), memory, settings);

    // Cancel without running a turn, so nothing ever resets the token
    chain.cancel_token().cancel();

    let err = chain.run_turn(fragments(&["Never."])).await.unwrap_err();
    assert!(matches!(err, PipelineError::GuardTimeout(50)));
    assert!(player.played.lock().is_empty());
}
