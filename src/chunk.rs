//! Boundary-aware overlapping text chunker.
//!
//! Splits normalized text into [`Chunk`]s of at most `max_chars` characters.
//! Splitting is greedy: each chunk extends to the paragraph, line, sentence,
//! or word boundary closest to the limit, falling back to a hard character
//! cut when no boundary exists inside the tolerance window. The next chunk
//! starts `overlap_chars` before the previous end, so adjacent chunks share
//! context.
//!
//! Chunk IDs are UUIDv5 over `(artifact_id, seq)` and chunking is fully
//! deterministic, so re-ingesting unchanged content reproduces the exact
//! same chunk sequence.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Fraction of `max_chars` scanned backwards for a split boundary.
const BOUNDARY_WINDOW_DIVISOR: usize = 4;

/// Split `text` into chunks for `artifact_id`.
///
/// Offsets are character (not byte) positions into `text`. Empty or
/// whitespace-only input yields no chunks. Caller must have validated
/// `overlap_chars < max_chars` (see [`crate::config::validate`]).
pub fn chunk_text(artifact_id: &str, text: &str, cfg: &ChunkingConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let max = cfg.max_chars;
    let overlap = cfg.overlap_chars;
    let tolerance = (max / BOUNDARY_WINDOW_DIVISOR).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut seq: i64 = 0;

    while start < n {
        let hard_end = (start + max).min(n);
        let end = if hard_end == n {
            n
        } else {
            boundary_before(&chars, hard_end.saturating_sub(tolerance).max(start + 1), hard_end)
                .unwrap_or(hard_end)
        };

        chunks.push(make_chunk(artifact_id, seq, &chars, start, end));
        seq += 1;

        if end == n {
            break;
        }
        // Back up by the overlap width; the +1 floor keeps the cursor
        // advancing even for extreme overlap/window combinations.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Find the best split position in `[lo, hi]`, scanning backwards.
/// Preference order: paragraph break, line break, sentence end, word gap.
fn boundary_before(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    let para = (lo..=hi)
        .rev()
        .find(|&p| p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n');
    if para.is_some() {
        return para;
    }
    let line = (lo..=hi).rev().find(|&p| p >= 1 && chars[p - 1] == '\n');
    if line.is_some() {
        return line;
    }
    let sentence = (lo..=hi)
        .rev()
        .find(|&p| p >= 2 && chars[p - 2] == '.' && chars[p - 1] == ' ');
    if sentence.is_some() {
        return sentence;
    }
    (lo..=hi).rev().find(|&p| p >= 1 && chars[p - 1] == ' ')
}

fn make_chunk(artifact_id: &str, seq: i64, chars: &[char], start: usize, end: usize) -> Chunk {
    let text: String = chars[start..end].iter().collect();
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Chunk::derive_id(artifact_id, seq),
        artifact_id: artifact_id.to_string(),
        seq,
        text,
        start,
        end,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    /// Concatenate non-overlapping portions in sequence order.
    fn reconstruct(text: &str, chunks: &[Chunk]) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::new();
        let mut covered = 0usize;
        for c in chunks {
            let from = covered.max(c.start);
            out.extend(chars[from..c.end].iter());
            covered = c.end;
        }
        out
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("a1", "Hello, world!", &cfg(1000, 200));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].seq, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("a1", "", &cfg(1000, 200)).is_empty());
        assert!(chunk_text("a1", "   \n\n  ", &cfg(1000, 200)).is_empty());
    }

    #[test]
    fn test_every_chunk_respects_max_chars() {
        let text = "word ".repeat(500);
        let chunks = chunk_text("a1", &text, &cfg(100, 20));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 100, "chunk too long: {}", c.text.len());
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(90), "b".repeat(90));
        let chunks = chunk_text("a1", &text, &cfg(100, 0));
        // First split lands right after the paragraph break, not mid-word.
        assert_eq!(chunks[0].end, 92);
        assert!(chunks[0].text.ends_with("\n\n"));
    }

    #[test]
    fn test_hard_cut_when_no_boundary_in_window() {
        let text = "x".repeat(250);
        let chunks = chunk_text("a1", &text, &cfg(100, 10));
        assert_eq!(chunks[0].end, 100);
        assert_eq!(chunks[1].start, 90); // backed up by overlap
    }

    #[test]
    fn test_overlapping_portions_reconstruct_source() {
        let text = "First sentence here. Second sentence follows. Third one too.\n\n\
                    A new paragraph with more content. It keeps going for a while. \
                    And ends eventually."
            .to_string();
        let chunks = chunk_text("a1", &text, &cfg(40, 10));
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_reconstruction_holds_for_hard_cuts() {
        let text = "z".repeat(333);
        let chunks = chunk_text("a1", &text, &cfg(50, 15));
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn test_deterministic_ids_and_sequence() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta.";
        let c1 = chunk_text("a1", text, &cfg(12, 4));
        let c2 = chunk_text("a1", text, &cfg(12, 4));
        assert_eq!(c1, c2);
        for (i, c) in c1.iter().enumerate() {
            assert_eq!(c.seq, i as i64);
        }
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_offsets() {
        let text = "héllo wörld ".repeat(30);
        let chunks = chunk_text("a1", &text, &cfg(25, 5));
        assert_eq!(reconstruct(&text, &chunks), text);
        for c in &chunks {
            assert!(c.text.chars().count() <= 25);
        }
    }
}
