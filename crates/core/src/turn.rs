//! Turn types
//!
//! Data carried through one conversation turn: the sentence units handed
//! from synthesis to playback, and the result the orchestrator returns.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque reference to a piece of synthesized audio
///
/// Wraps whatever the synthesizer hands back (a file path, a cache key, a
/// device buffer id). The pipeline never looks inside; it only passes the
/// handle to the player and releases it when the unit is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle(String);

impl AudioHandle {
    /// Create a handle from a path or id
    pub fn new(inner: impl Into<String>) -> Self {
        Self(inner.into())
    }

    /// The underlying path/id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sentence handed from the synthesis stage to the playback stage
///
/// `index` is 0-based and strictly increasing with no gaps over the units
/// that reach the channel. `audio` is `None` when the synthesizer reported
/// the empty/silent-audio condition: there is nothing to play, but the text
/// still counts toward the heard transcript.
#[derive(Debug, Clone)]
pub struct SentenceUnit {
    /// Ordinal within the turn
    pub index: usize,
    /// Literal sentence content, as accumulated (whitespace preserved)
    pub text: String,
    /// Synthesized audio, or `None` for the empty-audio condition
    pub audio: Option<AudioHandle>,
}

impl SentenceUnit {
    /// True when the synthesizer produced no playable audio for this unit
    pub fn is_silent(&self) -> bool {
        self.audio.is_none()
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The fragment source was fully consumed and spoken
    Completed,
    /// The turn was cancelled mid-stream; speech was truncated
    Interrupted,
}

/// Timing telemetry for one turn
#[derive(Debug, Clone, Default)]
pub struct TurnTimings {
    /// Time from turn start to the first finished synthesis call
    pub first_synthesis: Option<Duration>,
    /// Time from turn start to the first playback starting
    pub first_playback: Option<Duration>,
    /// Total turn duration
    pub total: Duration,
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Every fragment read from the source, even when cancellation truncated
    /// speech. This is what goes back to the language model's record.
    pub full_text: String,
    /// Concatenated text of the units that reached playback
    pub heard_text: String,
    /// Completed or interrupted
    pub outcome: TurnOutcome,
    /// Timing telemetry
    pub timings: TurnTimings,
}

impl TurnResult {
    /// True when the turn ran to completion
    pub fn is_completed(&self) -> bool {
        self.outcome == TurnOutcome::Completed
    }
}
