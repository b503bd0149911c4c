//! Core traits and types for the sentence-chain speech pipeline
//!
//! This crate provides the foundational pieces shared by the other crates:
//! - Turn types (sentence units, turn results, timing telemetry)
//! - Error types
//! - Collaborator traits (synthesizer, player, memory hook)

pub mod error;
pub mod traits;
pub mod turn;

pub use error::{Error, PlaybackError, Result, SynthesisError};
pub use traits::{FragmentStream, MemoryHook, Player, Synthesizer};
pub use turn::{AudioHandle, SentenceUnit, TurnOutcome, TurnResult, TurnTimings};
