//! Sentence-aligned chunking of normalized text for speech submission.
//!
//! Chunks concatenate back to the input exactly; each one remembers the char
//! offset of its first character so per-utterance boundary events can be
//! translated into the full-text coordinate space.

use tracing::debug;

/// Upper bound on chunk length, in characters, unless a single sentence is
/// longer on its own.
pub const MAX_CHUNK_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Char offset of the chunk's first character within the full text.
    pub start_offset: usize,
}

/// Split `text` into chunks of at most `max_chars` characters, flushing at
/// sentence boundaries. A sentence longer than `max_chars` becomes its own
/// oversized chunk rather than being split mid-sentence.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;
    let mut flushed_chars = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buffer_chars > 0 && buffer_chars + sentence_chars > max_chars {
            chunks.push(Chunk {
                text: std::mem::take(&mut buffer),
                start_offset: flushed_chars,
            });
            flushed_chars += buffer_chars;
            buffer_chars = 0;
        }
        buffer.push_str(sentence);
        buffer_chars += sentence_chars;
    }

    if buffer_chars > 0 {
        chunks.push(Chunk {
            text: buffer,
            start_offset: flushed_chars,
        });
    }

    debug!(chunks = chunks.len(), chars = text.chars().count(), "Chunked text");
    chunks
}

/// Split on "sentence terminator followed by whitespace", keeping every
/// character: each sentence slice retains its trailing whitespace so the
/// pieces concatenate back to `text` unchanged.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut terminated = false;
    let mut at_boundary = false;

    for (byte_idx, ch) in text.char_indices() {
        if at_boundary && !ch.is_whitespace() {
            sentences.push(&text[start..byte_idx]);
            start = byte_idx;
            at_boundary = false;
            terminated = false;
        }
        match ch {
            '.' | '!' | '?' => {
                terminated = true;
                at_boundary = false;
            }
            c if c.is_whitespace() => {
                if terminated {
                    at_boundary = true;
                }
            }
            _ => {
                terminated = false;
                at_boundary = false;
            }
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}
