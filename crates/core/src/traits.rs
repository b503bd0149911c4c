//! Collaborator traits
//!
//! The pipeline consumes its neighbors (language model output, TTS engine,
//! audio player) through these seams. Implementations live elsewhere; the
//! pipeline only relies on the contracts below.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::{PlaybackError, SynthesisError};
use crate::turn::AudioHandle;

/// Incremental text from the language model
///
/// Lazy, finite, single-pass: the pipeline consumes it exactly once per
/// turn. Fragments are arbitrary chunks, not aligned to words or sentences.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Text-to-speech engine boundary
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one sentence.
    ///
    /// `Ok(None)` is the distinguished empty/silent-audio condition: valid
    /// input that produces nothing to play. Errors are unit-local; the
    /// caller logs them and drops the sentence.
    async fn synthesize(&self, text: &str) -> Result<Option<AudioHandle>, SynthesisError>;
}

/// Audio playback boundary
#[async_trait]
pub trait Player: Send + Sync {
    /// Play one piece of audio to completion
    async fn play(&self, audio: &AudioHandle) -> Result<(), PlaybackError>;

    /// Destroy the backing audio resource.
    ///
    /// Called after playback, and for units abandoned by cancellation.
    async fn release(&self, audio: &AudioHandle);
}

/// Language-model memory repair hook
#[async_trait]
pub trait MemoryHook: Send + Sync {
    /// Notified once per cancelled turn with the text the user actually
    /// heard, so the model's record matches what was spoken rather than
    /// what it generated.
    async fn on_interrupt(&self, heard_text: &str);
}
