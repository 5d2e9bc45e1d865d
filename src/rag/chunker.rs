//! Fixed-size sliding-window chunking.
//!
//! Windows are measured in characters, not bytes, so multi-byte text never
//! gets split inside a code point.

use serde::{Deserialize, Serialize};

/// A window of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// The window's text.
    pub text: String,
    /// Character offset of the window in the source.
    pub start_offset: usize,
    /// Position of the window within the source, starting at 0.
    pub chunk_index: usize,
}

impl TextChunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Character offset one past the window's last character.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.char_len()
    }
}

/// Splits `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one.
///
/// The last window always ends at the end of `text`. When `overlap >= chunk_size`
/// the window cannot slide, so only the first window is produced; that is a
/// configuration mistake, not an error.
///
/// `chunk_size` must be greater than zero. A zero size yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();
    let mut chunks = Vec::new();

    if total_chars == 0 || chunk_size == 0 {
        return chunks;
    }

    let step = chunk_size.saturating_sub(overlap);
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(TextChunk {
            text: chars[start..end].iter().collect(),
            start_offset: start,
            chunk_index: chunks.len(),
        });

        if end >= total_chars {
            break;
        }

        let next = start + step;
        if next <= start {
            break;
        }
        start = next;
    }

    chunks
}

/// Number of windows [`chunk_text`] produces for a text of `text_len` characters.
pub fn expected_chunk_count(text_len: usize, chunk_size: usize, overlap: usize) -> usize {
    if text_len == 0 || chunk_size == 0 {
        return 0;
    }
    if text_len <= chunk_size || overlap >= chunk_size {
        return 1;
    }
    let step = chunk_size - overlap;
    (text_len - overlap).div_ceil(step)
}
