//! Streaming segmentation-synthesis-playback pipeline
//!
//! This crate turns an incrementally generated text stream into segmented
//! spoken output while staying interruptible at any point:
//! - Sentence boundary detection over an accumulating buffer
//! - Per-turn cooperative cancellation token
//! - Synthesis producer and playback consumer joined by a bounded channel
//! - The turn orchestrator wiring both stages together

pub mod cancel;
pub mod chain;
pub mod playback;
pub mod segment;
pub mod synthesis;

pub use cancel::CancelToken;
pub use chain::SpeechChain;
pub use segment::is_sentence_boundary;

use thiserror::Error;

/// Pipeline errors
///
/// Cancellation is not represented here: an interrupted turn is a normal
/// outcome (`TurnOutcome::Interrupted`), not an error. The only turn-fatal
/// condition is the pre-turn guard timing out.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Turn guard timed out after {0}ms")]
    GuardTimeout(u64),

    #[error("Stage task failed: {0}")]
    Stage(String),
}

impl From<PipelineError> for voicechain_core::Error {
    fn from(err: PipelineError) -> Self {
        voicechain_core::Error::Pipeline(err.to_string())
    }
}
