//! Sentence-aligned text chunking.
//!
//! Splits arbitrary-length text into an ordered list of [`Segment`]s that are
//! short enough to synthesize quickly but long enough to sound natural. The
//! chunker never splits inside a sentence: a sentence longer than the ceiling
//! becomes its own oversized segment.
//!
//! All lengths are measured in Unicode scalar values (`char`s).

use std::sync::{Arc, LazyLock};

use regex::Regex;

/// Default minimum segment length (floor)
pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 50;

/// Default soft ceiling for a segment
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 100;

/// A run of non-terminators followed by a run of terminators.
static SENTENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^.!?]+[.!?]+").expect("sentence pattern is a valid regex")
});

// =============================================================================
// Configuration
// =============================================================================

/// Length bounds used when accumulating sentences into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// A segment is only closed once it reaches this many characters
    pub min_chunk_length: usize,
    /// Appending a sentence that would push a segment past this closes it
    pub max_chunk_length: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_length: DEFAULT_MIN_CHUNK_LENGTH,
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_chunk_length == 0 {
            return Err("min_chunk_length must be greater than zero".to_string());
        }
        if self.min_chunk_length > self.max_chunk_length {
            return Err(format!(
                "min_chunk_length ({}) must not exceed max_chunk_length ({})",
                self.min_chunk_length, self.max_chunk_length
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Segment
// =============================================================================

/// One speakable piece of a request's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Position in the original text, 0-based and stable
    pub index: usize,
    /// Text sent to the provider for this segment
    pub source_text: String,
    /// The whole (trimmed) request text this segment came from
    pub full_text: Arc<str>,
}

// =============================================================================
// Chunking
// =============================================================================

/// Split `text` into sentence-aligned segments.
///
/// Returns an empty list for blank input. Text with at most one terminated
/// sentence is returned unchanged as a single segment, whatever follows it.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<Segment> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let full_text: Arc<str> = Arc::from(trimmed);
    let (mut units, tail) = split_sentences(trimmed);

    if units.len() <= 1 {
        return vec![Segment {
            index: 0,
            source_text: trimmed.to_string(),
            full_text,
        }];
    }
    units.extend(tail);

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for unit in units {
        if current.is_empty() {
            current.push_str(unit);
            continue;
        }

        let current_len = char_len(&current);
        let potential_len = current_len + 1 + char_len(unit);

        if potential_len > config.max_chunk_length && current_len >= config.min_chunk_length {
            chunks.push(std::mem::take(&mut current));
            current.push_str(unit);
        } else {
            current.push(' ');
            current.push_str(unit);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    // A short head segment would play a clipped fragment first.
    if chunks.len() > 1 && char_len(&chunks[0]) < config.min_chunk_length {
        let second = chunks.remove(1);
        chunks[0].push(' ');
        chunks[0].push_str(&second);
    }

    // Likewise for a short tail.
    if chunks.len() > 1
        && chunks
            .last()
            .is_some_and(|last| char_len(last) < config.min_chunk_length)
        && let Some(last) = chunks.pop()
        && let Some(previous) = chunks.last_mut()
    {
        previous.push(' ');
        previous.push_str(&last);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, source_text)| Segment {
            index,
            source_text,
            full_text: Arc::clone(&full_text),
        })
        .collect()
}

/// Trimmed terminated sentences, and the unterminated text after the last one.
///
/// Terminators at the very start have no sentence of their own and stay
/// attached to the first one.
fn split_sentences(text: &str) -> (Vec<&str>, Option<&str>) {
    let mut units = Vec::new();
    let mut consumed = 0;

    for found in SENTENCE_PATTERN.find_iter(text) {
        let unit = text[consumed..found.end()].trim();
        if !unit.is_empty() {
            units.push(unit);
        }
        consumed = found.end();
    }

    let rest = text[consumed..].trim();
    (units, (!rest.is_empty()).then_some(rest))
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}
