//! The "currently spoken" visual marker and its auto-scroll.
//!
//! At most one word carries the marker at any time. The controller never
//! touches a rendered tree itself; it emits effects the shell applies to the
//! annotated document.

use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightEffect {
    /// Remove the marker from the unit with this index.
    Clear { index: usize },
    /// Apply the marker to the unit with this index.
    Apply { index: usize },
    /// Smooth-scroll the unit into view, centered in its viewport.
    ScrollTo { index: usize },
}

#[derive(Debug)]
pub struct HighlightController {
    current: Option<usize>,
    scroll_debounce: Duration,
    last_scroll_at: Option<Instant>,
}

impl HighlightController {
    pub fn new(scroll_debounce: Duration) -> Self {
        Self {
            current: None,
            scroll_debounce,
            last_scroll_at: None,
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Move the marker to `index`. Callers skip this entirely when a boundary
    /// event resolved to nothing, which is what preserves the previous
    /// highlight on a miss.
    pub fn mark(&mut self, index: usize, now: Instant) -> Vec<HighlightEffect> {
        if self.current == Some(index) {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if let Some(previous) = self.current.take() {
            effects.push(HighlightEffect::Clear { index: previous });
        }
        self.current = Some(index);
        effects.push(HighlightEffect::Apply { index });

        let scroll_due = self
            .last_scroll_at
            .map(|at| now.saturating_duration_since(at) >= self.scroll_debounce)
            .unwrap_or(true);
        if scroll_due {
            self.last_scroll_at = Some(now);
            effects.push(HighlightEffect::ScrollTo { index });
        }
        effects
    }

    /// Unconditionally remove the marker (stop/restart/close paths).
    pub fn clear_all(&mut self) -> Vec<HighlightEffect> {
        self.last_scroll_at = None;
        match self.current.take() {
            Some(index) => {
                debug!(index, "Cleared highlight");
                vec![HighlightEffect::Clear { index }]
            }
            None => Vec::new(),
        }
    }
}
