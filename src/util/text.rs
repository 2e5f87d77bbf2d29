use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Length as the user perceives it (used for name limits)
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Truncate to `max_cells` terminal cells, ending with `…` when cut
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if max_cells == 0 {
        return String::new();
    }
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    let budget = max_cells - 1;
    let mut width = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let gw = UnicodeWidthStr::width(g);
        if width + gw > budget {
            break;
        }
        width += gw;
        out.push_str(g);
    }
    out.push('\u{2026}');
    out
}

/// Right-pad with spaces to exactly `cells` columns (truncating if longer)
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let w = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(w)));
    out
}

/// Byte offset of the grapheme after `at`, or `None` at the end
pub fn next_boundary(s: &str, at: usize) -> Option<usize> {
    if at >= s.len() {
        return None;
    }
    let step = s[at..].graphemes(true).next().map_or(0, str::len);
    Some(at + step)
}

/// Byte offset of the grapheme before `at`, or `None` at the start
pub fn prev_boundary(s: &str, at: usize) -> Option<usize> {
    if at == 0 {
        return None;
    }
    s[..at].grapheme_indices(true).last().map(|(i, _)| i)
}

/// Start of the word left of `at` (whitespace-delimited)
pub fn word_start_before(s: &str, at: usize) -> usize {
    let graphemes: Vec<(usize, &str)> = s[..at].grapheme_indices(true).collect();
    let blank = |g: &str| g.chars().all(char::is_whitespace);
    let mut idx = graphemes.len();
    while idx > 0 && blank(graphemes[idx - 1].1) {
        idx -= 1;
    }
    while idx > 0 && !blank(graphemes[idx - 1].1) {
        idx -= 1;
    }
    graphemes.get(idx).map_or(0, |(i, _)| *i)
}

/// Terminal column of a byte offset
pub fn column_of(s: &str, at: usize) -> usize {
    display_width(&s[..at.min(s.len())])
}
