//! Sentence-boundary text chunker with word overlap.
//!
//! Splits document text into overlapping segments of roughly
//! `target_size` characters, used as the unit of embedding and retrieval.
//!
//! # Algorithm
//!
//! 1. Split the text into sentences at whitespace runs that follow a
//!    sentence terminator (`.`, `!`, `?`).
//! 2. Accumulate sentences into a buffer, joined by single spaces.
//! 3. When `buffer + " " + sentence` would exceed `target_size` characters
//!    (and the buffer is non-empty), flush the trimmed buffer as a chunk.
//! 4. Seed the next buffer with the last `overlap / 5` space-separated words
//!    of the flushed buffer, followed by the sentence.
//! 5. Flush any non-empty remainder as the final chunk.
//!
//! The `overlap / 5` word count is a rough stand-in for an `overlap`
//! character count (five characters per word). A sentence longer than
//! `target_size` is never split, so chunks may exceed the target.
//!
//! # Example
//!
//! ```rust
//! use arcana_core::chunk::split_into_chunks;
//!
//! let chunks = split_into_chunks("One sentence. Another one!", 500, 50);
//! assert_eq!(chunks, vec!["One sentence. Another one!".to_string()]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::NewChunk;

/// Default chunk target size in characters.
pub const DEFAULT_TARGET_SIZE: usize = 500;

/// Default overlap in characters (approximated as `overlap / 5` words).
pub const DEFAULT_OVERLAP: usize = 50;

/// Approximate characters per word used to turn the overlap into a word count.
const CHARS_PER_WORD: usize = 5;

/// Split text into overlapping chunks on sentence boundaries.
///
/// # Guarantees
///
/// - Empty or whitespace-only input yields no chunks.
/// - No returned chunk is empty.
/// - Sentences appear in document order and are never split.
/// - Deterministic for the same input.
pub fn split_into_chunks(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    let overlap_words = overlap / CHARS_PER_WORD;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let would_be = char_len(&current) + 1 + char_len(sentence);

        if would_be > target_size && !current.is_empty() {
            let flushed = current.trim();
            if !flushed.is_empty() {
                chunks.push(flushed.to_string());
            }
            let tail = trailing_words(&current, overlap_words);
            current = format!("{} {}", tail, sentence);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Split text after `.`, `!`, or `?` wherever a whitespace run follows.
///
/// The whitespace run itself is dropped; whitespace inside a sentence
/// (including newlines) is kept. Empty trailing pieces are skipped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => {}
            _ => continue,
        }
        sentences.push(&text[start..end]);
        start = end;
        while let Some(&(j, ws)) = chars.peek() {
            if ws.is_whitespace() {
                chars.next();
                start = j + ws.len_utf8();
            } else {
                break;
            }
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Turn chunk texts into [`NewChunk`]s with contiguous indices starting at 0.
///
/// Each chunk's metadata records its character count and the SHA-256 hex
/// digest of its content.
pub fn build_chunks(pieces: Vec<String>) -> Vec<NewChunk> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let metadata = serde_json::json!({
                "char_count": char_len(&content),
                "content_hash": content_hash(&content),
            });
            NewChunk {
                content,
                embedding: None,
                chunk_index: index as i64,
                metadata,
            }
        })
        .collect()
}

/// SHA-256 hex digest of a chunk's text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Last `count` words of `text`, split on single spaces.
fn trailing_words(text: &str, count: usize) -> String {
    if count == 0 {
        // Overlap budgets under one word carry nothing forward, not the whole buffer.
        return String::new();
    }
    let words: Vec<&str> = text.split(' ').collect();
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
