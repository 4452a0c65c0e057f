//! Character-budget semantic chunking with a fixed overlap between neighbours.
//!
//! Highlights:
//!
//! - Boundaries: `semchunk-rs` picks the split points, preferring newline runs, then other
//!   whitespace, then punctuation, and only cutting inside a word when nothing else fits.
//! - Budget: every emitted chunk holds at most `chunk_size` characters (Unicode scalar values).
//!   Semantic pieces are cut to `chunk_size - overlap - 1` so the overlap and one joining
//!   character always fit.
//! - Overlap: chunk `n + 1` opens with the trailing `overlap` characters of chunk `n`, followed by
//!   the first character of the original gap between the two pieces (if any).

use super::types::ChunkingError;
use semchunk_rs::Chunker;

/// Maximum chunk length, in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared by adjacent chunks.
pub const CHUNK_OVERLAP: usize = 100;

fn char_count(segment: &str) -> usize {
    segment.chars().count()
}

/// Split `text` into overlapping chunks.
///
/// Returns an empty vector when the input is all whitespace.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap + 1 >= chunk_size {
        return Err(ChunkingError::OverlapTooLarge {
            overlap,
            chunk_size,
        });
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let piece_budget = if overlap == 0 {
        chunk_size
    } else {
        chunk_size - overlap - 1
    };
    let chunker = Chunker::new(piece_budget, Box::new(char_count));
    let pieces: Vec<String> = chunker
        .chunk(text)
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .collect();

    Ok(apply_overlap(text, pieces, overlap))
}

/// Prefix every piece after the first with the tail of the chunk emitted before it.
fn apply_overlap(text: &str, pieces: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 {
        return pieces;
    }

    let mut chunks: Vec<String> = Vec::with_capacity(pieces.len());
    let mut cursor = 0;
    for piece in pieces {
        let located = text[cursor..]
            .find(piece.as_str())
            .map(|offset| cursor + offset);
        let joiner = match located {
            Some(start) => text[cursor..start].chars().next(),
            None => Some(' '),
        };
        if let Some(start) = located {
            cursor = start + piece.len();
        }

        let chunk = match chunks.last() {
            None => piece,
            Some(previous) => build_overlapped_chunk(previous, &piece, joiner, overlap),
        };
        chunks.push(chunk);
    }
    chunks
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    joiner: Option<char>,
    overlap: usize,
) -> String {
    let tail = tail_chars(previous, overlap);
    let mut combined = String::with_capacity(tail.len() + current.len() + 4);
    combined.push_str(tail);
    if let Some(joiner) = joiner {
        combined.push(joiner);
    }
    combined.push_str(current);
    combined
}

/// Last `count` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    let skip = char_count(text).saturating_sub(count);
    text.char_indices()
        .nth(skip)
        .map_or("", |(offset, _)| &text[offset..])
}
