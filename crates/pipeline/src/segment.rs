//! Sentence boundary detection
//!
//! Pure decision function over the sentence buffer accumulated since the
//! last emitted boundary. No state, callable any number of times per turn.

use once_cell::sync::Lazy;

/// Abbreviations whose trailing period never ends a sentence.
///
/// Suffix-matched case-insensitively, each entry checked independently.
const ABBREVIATIONS: &[&str] = &[
    "...", "Dr.", "Mr.", "Ms.", "Mrs.", "Jr.", "Sr.", "St.", "Ave.", "Rd.", "Blvd.", "Dept.",
    "Univ.", "Prof.", "Ph.D.", "M.D.", "U.S.", "U.K.", "U.N.", "E.U.", "U.S.A.", "U.S.S.R.",
    "U.A.E.", "NY.",
];

/// Terminal punctuation: Latin plus CJK/full-width terminators.
const TERMINATORS: &[char] = &['.', '?', '!', '。', '；', '？', '！', '…', '〰', '〜', '～'];

static ABBREVIATIONS_LOWER: Lazy<Vec<String>> =
    Lazy::new(|| ABBREVIATIONS.iter().map(|a| a.to_lowercase()).collect());

/// Decide whether the buffer ends a sentence.
///
/// The abbreviation allow-list is checked before the punctuation set, so
/// "Dr." is never a boundary even though it ends with a period.
pub fn is_sentence_boundary(buffer: &str) -> bool {
    let trimmed = buffer.trim_end();
    if trimmed.is_empty() {
        return false;
    }

    let lowered = trimmed.to_lowercase();
    if ABBREVIATIONS_LOWER
        .iter()
        .any(|abbr| lowered.ends_with(abbr.as_str()))
    {
        return false;
    }

    trimmed.ends_with(TERMINATORS)
}
