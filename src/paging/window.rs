use std::collections::HashMap;
use std::ops::Range;

use crate::model::{SectionId, TaskId};
use crate::store::Board;

/// How a section's rows are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLayout {
    /// Every row is rendered
    Full,
    /// Rows render through a window over the section's own scroll region
    Windowed,
}

impl SectionLayout {
    /// Sections below `threshold` tasks render fully
    pub fn for_len(len: usize, threshold: usize) -> Self {
        if len < threshold {
            SectionLayout::Full
        } else {
            SectionLayout::Windowed
        }
    }
}

/// Scroll state of a windowed section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub height: usize,
}

impl Window {
    pub fn new(height: usize) -> Self {
        Window { offset: 0, height }
    }

    pub fn visible_range(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len.saturating_sub(self.height));
        start..(start + self.height).min(len)
    }

    /// Scroll by `delta` rows, clamped to the content
    pub fn scroll_by(&mut self, delta: isize, len: usize) {
        let max = len.saturating_sub(self.height);
        self.offset = self.offset.saturating_add_signed(delta).min(max);
    }

    /// Bring `index` into view
    pub fn reveal(&mut self, index: usize) {
        if index < self.offset {
            self.offset = index;
        } else if self.height > 0 && index >= self.offset + self.height {
            self.offset = index + 1 - self.height;
        }
    }

    /// True when the bottom of the window is within `margin` rows of the
    /// end of the loaded rows
    pub fn near_end(&self, len: usize, margin: usize) -> bool {
        self.visible_range(len).end + margin >= len
    }
}

/// One rendered line of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Header(SectionId),
    Task(TaskId),
    /// "more rows" / loading marker at the end of a section with unfetched
    /// pages
    More(SectionId),
}

/// Lay out the whole board as lines for the shared scroll container.
/// Collapsed sections contribute their header only; windowed sections
/// contribute the rows of their window (`window_rows` tall until scrolled).
pub fn flatten(
    board: &Board,
    threshold: usize,
    window_rows: usize,
    windows: &HashMap<SectionId, Window>,
) -> Vec<Line> {
    let mut lines = Vec::new();
    for section in board.sections() {
        lines.push(Line::Header(section.id));
        if section.collapsed {
            continue;
        }
        let len = section.tasks.len();
        let range = match SectionLayout::for_len(len, threshold) {
            SectionLayout::Full => 0..len,
            SectionLayout::Windowed => windows
                .get(&section.id)
                .copied()
                .unwrap_or_else(|| Window::new(window_rows))
                .visible_range(len),
        };
        lines.extend(section.tasks[range].iter().map(|t| Line::Task(*t)));
        if section.page.has_more() || section.loading {
            lines.push(Line::More(section.id));
        }
    }
    lines
}
