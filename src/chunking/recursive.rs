//! Recursive separator splitter.
//!
//! Splitting strategy:
//! 1. Cut on the coarsest separator present (paragraph, line, space, char),
//!    keeping each separator on the piece before it
//! 2. Pieces over the budget are cut again with the next finer separator
//! 3. Pieces are merged greedily into chunks
//! 4. When a chunk is emitted, trailing pieces up to `overlap` chars start the
//!    next one. If the last piece alone is longer, its word-aligned tail is used.

use std::collections::VecDeque;

use super::fences::Segment;
use super::ChunkConfig;

/// Separators in priority order. The empty separator splits into characters.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

pub struct RecursiveSplitter {
    max_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkConfig) -> Self {
        Self {
            max_size: config.max_size.max(1),
            overlap: config.overlap,
        }
    }

    /// Split plain text.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        self.collect_pieces(text, &SEPARATORS, &mut pieces);
        self.merge(&pieces)
    }

    /// Split pre-segmented text. Fenced code that fits is one piece and never
    /// cut; everything else is cut like prose. All pieces are merged together,
    /// so overlap carries across segment boundaries.
    pub fn split_segments<'a>(&self, segments: &[Segment<'a>]) -> Vec<String> {
        let mut pieces = Vec::new();

        for segment in segments {
            if segment.fenced {
                if char_len(segment.text) <= self.max_size {
                    pieces.push(segment.text);
                    continue;
                }
                tracing::debug!(
                    "Fenced block of {} chars exceeds chunk size {}, splitting it",
                    char_len(segment.text),
                    self.max_size
                );
            }
            self.collect_pieces(segment.text, &SEPARATORS, &mut pieces);
        }

        self.merge(&pieces)
    }

    /// Cut `text` into pieces of at most `max_size` chars whose concatenation
    /// is `text`.
    fn collect_pieces<'a>(&self, text: &'a str, separators: &[&str], out: &mut Vec<&'a str>) {
        let Some(i) = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(*s))
        else {
            out.extend(split_chars(text));
            return;
        };

        let separator = separators[i];
        if separator.is_empty() {
            out.extend(split_chars(text));
            return;
        }

        for piece in text.split_inclusive(separator) {
            if char_len(piece) <= self.max_size {
                out.push(piece);
            } else {
                self.collect_pieces(piece, &separators[i + 1..], out);
            }
        }
    }

    /// Greedily join pieces (each at most `max_size`) into chunks.
    fn merge<'a>(&self, pieces: &[&'a str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&'a str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.max_size && !current.is_empty() {
                push_doc(&mut docs, &current);
                self.retain_overlap(&mut current, &mut total, len);
            }
            total += len;
            current.push_back(piece);
        }

        push_doc(&mut docs, &current);
        docs
    }

    /// Reduce the emitted chunk's pieces to the tail that starts the next
    /// chunk: at most `overlap` chars, leaving room for a piece of `next_len`.
    fn retain_overlap<'a>(
        &self,
        current: &mut VecDeque<&'a str>,
        total: &mut usize,
        next_len: usize,
    ) {
        let emitted: Vec<&'a str> = current.iter().copied().collect();

        while *total > self.overlap || (*total > 0 && *total + next_len > self.max_size) {
            let Some(first) = current.pop_front() else {
                break;
            };
            *total -= char_len(first);
        }

        if self.overlap == 0 || current.iter().any(|p| !p.trim().is_empty()) {
            return;
        }

        // whole pieces are too long to carry over; take the end of the last one with text
        let Some(last) = emitted.iter().rposition(|p| !p.trim().is_empty()) else {
            return;
        };
        let trailing = &emitted[last + 1..];
        let trailing_len: usize = trailing.iter().map(|p| char_len(p)).sum();
        let room = self
            .overlap
            .min(self.max_size.saturating_sub(next_len))
            .saturating_sub(trailing_len);
        if room == 0 {
            return;
        }

        let seed = word_aligned_tail(emitted[last], room);
        if seed.trim().is_empty() {
            return;
        }

        current.clear();
        current.push_back(seed);
        current.extend(trailing.iter().copied());
        *total = char_len(seed) + trailing_len;
    }
}

/// The last `limit` chars of `piece` at most, starting on a word boundary
/// when one is available.
fn word_aligned_tail(piece: &str, limit: usize) -> &str {
    let len = char_len(piece);
    if len <= limit {
        return piece;
    }

    let start = piece
        .char_indices()
        .nth(len - limit)
        .map(|(i, _)| i)
        .unwrap_or(piece.len());
    let tail = &piece[start..];

    if !piece[..start].ends_with(char::is_whitespace) {
        if let Some(ws) = tail.find(char::is_whitespace) {
            let aligned = &tail[ws..];
            if !aligned.trim().is_empty() {
                return aligned;
            }
        }
    }
    tail
}

fn push_doc(docs: &mut Vec<String>, current: &VecDeque<&str>) {
    let joined: String = current.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn split_chars(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .map(move |(i, c)| &text[i..i + c.len_utf8()])
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
