//! Splits documents into bounded-length segments for synthesis.
//!
//! Lengths are measured in Unicode scalar values, never bytes, so a segment
//! boundary can never fall inside a multi-byte character.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("Invalid argument: max chunk length must be a positive integer, got {0}")]
    InvalidArgument(i64),
}

/// How the orchestrator cuts a document into segments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Fixed-width slices of exactly `max_chunk_len` characters
    #[default]
    Fixed,
    /// Prefer to break after whitespace so words stay intact
    Words,
}

impl std::str::FromStr for SplitMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "words" => Ok(Self::Words),
            _ => Err(format!(
                "Invalid split mode: {value}. Valid options: fixed, words"
            )),
        }
    }
}

/// One bounded slice of the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub content: String,
}

impl Segment {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// 1-based position, used for artifact names and log lines.
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

pub fn split_with_mode(
    text: &str,
    max_chunk_len: i64,
    mode: SplitMode,
) -> Result<Vec<Segment>, ChunkError> {
    match mode {
        SplitMode::Fixed => split(text, max_chunk_len),
        SplitMode::Words => split_on_words(text, max_chunk_len),
    }
}

/// Partition `text` into contiguous slices of at most `max_chunk_len`
/// characters. Whitespace-only input yields no segments.
pub fn split(text: &str, max_chunk_len: i64) -> Result<Vec<Segment>, ChunkError> {
    let limit = validate_limit(max_chunk_len)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(cut(text, limit, |_window| None))
}

/// Like [`split`], but each cut is moved back to just after the last
/// whitespace inside the window. A window with no whitespace is cut hard at
/// the limit. Concatenating the segments still reproduces `text`.
pub fn split_on_words(text: &str, max_chunk_len: i64) -> Result<Vec<Segment>, ChunkError> {
    let limit = validate_limit(max_chunk_len)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(cut(text, limit, |window| {
        window
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .last()
            .map(|(offset, c)| offset + c.len_utf8())
            .filter(|&end| end < window.len())
    }))
}

fn validate_limit(max_chunk_len: i64) -> Result<usize, ChunkError> {
    if max_chunk_len <= 0 {
        return Err(ChunkError::InvalidArgument(max_chunk_len));
    }
    usize::try_from(max_chunk_len).map_err(|_| ChunkError::InvalidArgument(max_chunk_len))
}

/// Walks `text` in windows of `limit` characters. `preferred_end` may return a
/// shorter byte length for a full window; it must be non-zero and on a char
/// boundary of the window.
fn cut<F>(text: &str, limit: usize, preferred_end: F) -> Vec<Segment>
where
    F: Fn(&str) -> Option<usize>,
{
    let mut segments = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(offset, _)| offset)
            .unwrap_or(rest.len());

        let end = if window_end < rest.len() {
            preferred_end(&rest[..window_end])
                .filter(|&end| end > 0)
                .unwrap_or(window_end)
        } else {
            window_end
        };

        let (head, tail) = rest.split_at(end);
        segments.push(Segment {
            index: segments.len(),
            content: head.to_string(),
        });
        rest = tail;
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn joined(segments: &[Segment]) -> String {
        segments.iter().map(|s| s.content.as_str()).collect()
    }

    #[rstest]
    #[case("", 10)]
    #[case("   ", 10)]
    #[case("\n\t  \r\n", 1)]
    fn test_blank_input_yields_no_segments(#[case] text: &str, #[case] limit: i64) {
        assert!(split(text, limit).unwrap().is_empty());
        assert!(split_on_words(text, limit).unwrap().is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(-5)]
    fn test_non_positive_limit_is_rejected(#[case] limit: i64) {
        assert_eq!(
            split("hello", limit),
            Err(ChunkError::InvalidArgument(limit))
        );
        assert_eq!(
            split_on_words("hello", limit),
            Err(ChunkError::InvalidArgument(limit))
        );
    }

    #[test]
    fn test_invalid_limit_checked_before_blank_input() {
        assert!(split("", 0).is_err());
    }

    #[rstest]
    #[case("abcdefghij", 3, 4)]
    #[case("abcdefghij", 5, 2)]
    #[case("abcdefghij", 10, 1)]
    #[case("abcdefghij", 11, 1)]
    #[case("a", 1, 1)]
    #[case("  leading and trailing  ", 4, 6)]
    fn test_fixed_split_count_and_round_trip(
        #[case] text: &str,
        #[case] limit: i64,
        #[case] expected: usize,
    ) {
        let segments = split(text, limit).unwrap();
        assert_eq!(segments.len(), expected);
        assert_eq!(joined(&segments), text);
        assert!(segments.iter().all(|s| s.len() <= limit as usize));
        assert!(segments.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn test_fixed_split_preserves_interior_whitespace() {
        let segments = split("ab  cd", 3).unwrap();
        let contents: Vec<&str> = segments.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["ab ", " cd"]);
    }

    #[test]
    fn test_indices_are_sequential() {
        let segments = split("abcdefg", 2).unwrap();
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(segments[3].position(), 4);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "héllo wörld ñ";
        let segments = split(text, 4).unwrap();
        assert_eq!(segments.len(), text.chars().count().div_ceil(4));
        assert_eq!(joined(&segments), text);
        assert!(segments.iter().all(|s| s.len() <= 4));
    }

    #[test]
    fn test_word_split_keeps_words_whole() {
        let segments = split_on_words("the quick brown fox", 10).unwrap();
        let contents: Vec<&str> = segments.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["the quick ", "brown fox"]);
    }

    #[test]
    fn test_word_split_hard_breaks_long_words() {
        let segments = split_on_words("abcdefghijkl mnop", 5).unwrap();
        let contents: Vec<&str> = segments.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["abcde", "fghij", "kl ", "mnop"]);
    }

    #[rstest]
    #[case("Lorem ipsum dolor sit amet, consectetur adipiscing elit.", 7)]
    #[case("one  two\n\nthree\tfour", 3)]
    #[case("ünïcödé wörds gô hérè", 6)]
    #[case("x", 100)]
    fn test_word_split_round_trip_and_bound(#[case] text: &str, #[case] limit: i64) {
        let segments = split_on_words(text, limit).unwrap();
        assert_eq!(joined(&segments), text);
        assert!(segments.iter().all(|s| s.len() <= limit as usize && !s.is_empty()));
    }

    #[test]
    fn test_split_mode_parse() {
        assert_eq!("Words".parse::<SplitMode>(), Ok(SplitMode::Words));
        assert_eq!("fixed".parse::<SplitMode>(), Ok(SplitMode::Fixed));
        assert!("sentences".parse::<SplitMode>().is_err());
    }
}
