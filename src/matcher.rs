//! Resolving noisy spoken-word boundary events to indexed word units.
//!
//! Platform boundary offsets drift, chunk seams shift them further, and word
//! content alone is ambiguous under repetition. The resolver combines an
//! offset tolerance window with a monotonic forward preference; when nothing
//! matches it returns `None` and the caller keeps the previous highlight.

use crate::indexer::WordUnit;
use crate::normalizer::normalized_word;
use crate::speech::SpokenWord;
use tracing::trace;

/// Default half-width of the offset tolerance window, in chars. Tunable via
/// [`crate::config::ReaderConfig::match_tolerance`]; useful values grow with
/// the length of the rendered text.
pub const DEFAULT_TOLERANCE: usize = 30;

/// Resolve a boundary event against the unit table.
///
/// `last_index` is the most recently highlighted unit; forward search resumes
/// after it so repeated words advance instead of snapping back.
pub fn resolve<'a>(
    event: &SpokenWord,
    units: &'a [WordUnit],
    last_index: Option<usize>,
    tolerance: usize,
) -> Option<&'a WordUnit> {
    if units.is_empty() {
        return None;
    }
    let target = normalized_word(&event.word);

    // Proximity: every unit whose offset sits inside the tolerance window,
    // preferring content agreement, then the smallest offset distance.
    let mut window: Vec<&WordUnit> = units
        .iter()
        .filter(|unit| unit.char_offset.abs_diff(event.char_offset) < tolerance)
        .collect();
    if !window.is_empty() {
        window.sort_by_key(|unit| {
            (
                content_rank(&target, &unit.normalized),
                unit.char_offset.abs_diff(event.char_offset),
            )
        });
        return window.first().copied();
    }

    if target.is_empty() {
        trace!(word = %event.word, "Boundary event normalizes to nothing; skipping");
        return None;
    }

    // Forward search: first exact match after the last highlight, wrapping to
    // the document's first exact match when the tail has none.
    let resume_at = last_index.map(|idx| idx + 1).unwrap_or(0);
    let forward = units
        .iter()
        .find(|unit| unit.index >= resume_at && unit.normalized == target)
        .or_else(|| units.iter().find(|unit| unit.normalized == target));
    if forward.is_some() {
        return forward;
    }

    // Fallback: loose containment anywhere in the document.
    let fallback = units.iter().find(|unit| {
        !unit.normalized.is_empty()
            && (unit.normalized.contains(&target) || target.contains(&unit.normalized))
    });
    if fallback.is_none() {
        trace!(
            word = %event.word,
            offset = event.char_offset,
            "No word unit matched boundary event"
        );
    }
    fallback
}

/// 0 = exact, 1 = one form contains the other, 2 = unrelated.
fn content_rank(target: &str, normalized: &str) -> u8 {
    if target.is_empty() || normalized.is_empty() {
        return 2;
    }
    if normalized == target {
        0
    } else if normalized.contains(target) || target.contains(normalized) {
        1
    } else {
        2
    }
}
