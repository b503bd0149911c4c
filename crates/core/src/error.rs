//! Error types for the speech pipeline

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the speech pipeline
///
/// Stage-local failures convert into it with `?` at the embedding boundary:
///
/// ```
/// use voicechain_core::{Error, PlaybackError, Result, SynthesisError};
///
/// fn engine_step() -> std::result::Result<(), SynthesisError> {
///     Err(SynthesisError::Engine("model not loaded".into()))
/// }
///
/// fn synthesize() -> Result<()> {
///     engine_step()?;
///     Ok(())
/// }
///
/// assert!(matches!(synthesize(), Err(Error::Synthesis(_))));
///
/// let err: Error = PlaybackError::Device("device lost".into()).into();
/// assert!(matches!(err, Error::Playback(_)));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Per-sentence synthesis failures
///
/// These are unit-local: a failed sentence is logged and dropped, the turn
/// continues with the next one.
#[derive(Error, Debug, Clone)]
pub enum SynthesisError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Per-unit playback failures
///
/// Same policy as synthesis failures: logged and skipped, never turn-fatal.
#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("IO error: {0}")]
    Io(String),
}
