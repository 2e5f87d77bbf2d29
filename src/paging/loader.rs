use std::time::{Duration, Instant};

use super::window::Line;
use crate::model::SectionId;
use crate::store::Board;

/// Debounced next-page trigger for the shared scroll container.
///
/// Scrolling near the bottom arms the loader; once the quiet period passes
/// it picks the first expanded section that still has unfetched pages.
/// Nothing is picked while any section is loading, so pages arrive one
/// section at a time.
#[derive(Debug, Clone)]
pub struct PageLoader {
    delay: Duration,
    deadline: Option<Instant>,
}

impl PageLoader {
    pub fn new(delay: Duration) -> Self {
        PageLoader {
            delay,
            deadline: None,
        }
    }

    /// The viewport reached the bottom region
    pub fn near_bottom(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Section whose next page should be fetched now, if any
    pub fn poll(&mut self, now: Instant, board: &Board) -> Option<SectionId> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        if board.sections().any(|s| s.loading) {
            return None;
        }
        self.deadline = None;
        next_section_to_load(board)
    }
}

/// First expanded section with unfetched pages
pub fn next_section_to_load(board: &Board) -> Option<SectionId> {
    board
        .sections()
        .find(|s| s.is_expanded() && s.page.has_more() && !s.loading)
        .map(|s| s.id)
}

/// Keeps the viewport on the same row when lines are appended or removed
/// above it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollAnchor {
    line: Line,
    /// Distance of the anchor line from the top of the viewport
    delta: usize,
}

impl ScrollAnchor {
    /// Anchor on the line at the top of the viewport
    pub fn capture(lines: &[Line], offset: usize) -> Option<Self> {
        let line = *lines.get(offset)?;
        Some(ScrollAnchor { line, delta: 0 })
    }

    /// Viewport offset that puts the anchor back where it was. `None` if
    /// the anchor line is gone.
    pub fn restore(&self, lines: &[Line]) -> Option<usize> {
        let at = lines.iter().position(|l| *l == self.line)?;
        Some(at.saturating_sub(self.delta))
    }
}
