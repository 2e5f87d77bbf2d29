use std::time::Instant;

use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::layout::Rect;

use crate::api::memory::MemoryRemote;
use crate::model::Config;
use crate::session::Session;
use crate::tui::app::App;

pub const TERM_W: u16 = 100;
pub const TERM_H: u16 = 30;

/// Render into an in-memory buffer and return plain text (no styles).
pub fn render_to_string<F>(w: u16, h: u16, f: F) -> String
where
    F: FnOnce(&mut ratatui::Frame, Rect),
{
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            f(frame, area);
        })
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    // Trim trailing blank lines
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

/// Render the whole screen for `app`
pub fn render_app(app: &mut App, w: u16, h: u16) -> String {
    render_to_string(w, h, |frame, _| super::render(frame, app))
}

/// An app over the demo board with the first page of every section
/// loaded. The remote is returned so tests can keep driving requests.
pub fn demo_app() -> (App, MemoryRemote) {
    let remote = MemoryRemote::demo(25);
    let mut session = Session::new(Config::default());
    session.load_sections();
    session.load_users();
    session.drive(&remote, Instant::now());
    (App::new(session), remote)
}

/// Execute queued requests against the demo remote
pub fn settle(app: &mut App, remote: &MemoryRemote) {
    app.session.drive(remote, Instant::now());
}
