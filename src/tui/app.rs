use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::api::SharedRemote;
use crate::io::config_io::LoadedConfig;
use crate::io::state::{UiState, read_ui_state, write_ui_state};
use crate::model::{FilterState, Priority, SectionId};
use crate::session::Session;

use super::input;
use super::render;
use super::theme::Theme;
use super::worker::Worker;

/// Longest the event loop sleeps waiting for input
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Rows of the filter form, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRow {
    Search,
    Status(usize),
    Priority,
    Assignee,
    DueFrom,
    DueTo,
}

/// Draft filter edited in the filter modal; applied on Enter
#[derive(Debug, Clone, PartialEq)]
pub struct FilterForm {
    pub draft: FilterState,
    pub focus: usize,
    pub due_from: String,
    pub due_to: String,
}

impl FilterForm {
    pub fn new(current: &FilterState) -> Self {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string());
        FilterForm {
            draft: current.clone(),
            focus: 0,
            due_from: date(current.due.from).unwrap_or_default(),
            due_to: date(current.due.to).unwrap_or_default(),
        }
    }

    /// Form rows for a catalog of `statuses` entries
    pub fn rows(statuses: usize) -> Vec<FilterRow> {
        let mut rows = vec![FilterRow::Search];
        rows.extend((0..statuses).map(FilterRow::Status));
        rows.extend([
            FilterRow::Priority,
            FilterRow::Assignee,
            FilterRow::DueFrom,
            FilterRow::DueTo,
        ]);
        rows
    }
}

/// Cycle an optional priority: any → low → medium → high → any
pub fn next_priority(p: Option<Priority>) -> Option<Priority> {
    match p {
        None => Some(Priority::Low),
        Some(Priority::High) => None,
        Some(p) => Some(p.next()),
    }
}

/// Main application state
pub struct App {
    pub session: Session,
    pub theme: Theme,
    pub should_quit: bool,
    /// Section the cursor sits on when no task is selected
    pub focus: Option<SectionId>,
    /// Open filter form (shown while the filter modal is up)
    pub filter_form: Option<FilterForm>,
    /// Where the cursor of the name editor was drawn last frame
    pub edit_anchor: Option<(u16, u16)>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let theme = Theme::from_statuses(&session.config().statuses);
        App {
            session,
            theme,
            should_quit: false,
            focus: None,
            filter_form: None,
            edit_anchor: None,
        }
    }

    /// The section the cursor is in: the selected task's section, else the
    /// focused header, else the first section
    pub fn current_section(&self) -> Option<SectionId> {
        let board = self.session.board();
        self.session
            .selected()
            .and_then(|t| board.owner(t))
            .or(self.focus.filter(|s| board.section(*s).is_some()))
            .or_else(|| board.sections().next().map(|s| s.id))
    }

    /// Move the cursor to the section `delta` steps away. Lands on the
    /// section's first task when it has visible tasks.
    pub fn jump_section(&mut self, delta: isize, now: Instant) {
        let ids = self.session.board().section_ids();
        if ids.is_empty() {
            return;
        }
        let here = self
            .current_section()
            .and_then(|s| ids.iter().position(|id| *id == s))
            .unwrap_or(0);
        let target = ids[here.saturating_add_signed(delta).min(ids.len() - 1)];
        self.focus_section(target, now);
    }

    pub fn focus_section(&mut self, section: SectionId, now: Instant) {
        self.focus = Some(section);
        let first = self
            .session
            .board()
            .section(section)
            .filter(|s| s.is_expanded())
            .and_then(|s| s.tasks.first().copied());
        self.session.select(first);
        match first {
            Some(task) => self.session.reveal(task, now),
            None => self.session.reveal_section(section, now),
        }
    }

    /// Snapshot of what survives a restart
    pub fn ui_state(&self) -> UiState {
        UiState {
            project: self.session.config().server.project,
            collapsed: self.session.collapsed_sections(),
            filter: self.session.filter().clone(),
        }
    }

    /// Apply saved state for this project; state saved for another project
    /// is ignored
    pub fn restore(&mut self, state: UiState) {
        if state.project != self.session.config().server.project {
            tracing::debug!(saved = state.project, "UI state belongs to another project");
            return;
        }
        self.session.restore_collapsed(state.collapsed);
        self.session.set_filter(state.filter);
    }
}

/// Run the TUI application
pub fn run(
    loaded: LoadedConfig,
    remote: SharedRemote,
    cwd: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let state_dir: PathBuf = loaded.state_dir(cwd);
    let mut app = App::new(Session::new(loaded.config));

    // Restore saved UI state before the first fetch so it applies to it
    if let Some(state) = read_ui_state(&state_dir) {
        app.restore(state);
    }
    app.session.load_sections();
    app.session.load_users();

    let worker = Worker::spawn(remote)?;
    tracing::info!(dir = %state_dir.display(), "board opened");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Install panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableBracketedPaste, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app, &worker);

    app.session.unmount();
    if let Err(e) = write_ui_state(&state_dir, &app.ui_state()) {
        tracing::warn!(error = %e, "could not save UI state");
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    worker: &Worker,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let now = Instant::now();
        for done in worker.poll() {
            app.session.complete(done.id, done.result, now);
        }
        app.session.tick(now);
        worker.submit(app.session.drain_outbox());

        terminal.draw(|frame| render::render(frame, app))?;

        let timeout = app
            .session
            .next_deadline()
            .map_or(IDLE_POLL, |d| d.saturating_duration_since(Instant::now()))
            .min(IDLE_POLL);
        if event::poll(timeout)? {
            let now = Instant::now();
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    input::handle_key(app, key, now);
                }
                Event::Paste(text) => input::handle_paste(app, &text, now),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::render::test_helpers::demo_app;
    use pretty_assertions::assert_eq;

    #[test]
    fn ui_state_round_trip_through_app() {
        let (mut app, _remote) = demo_app();
        let backlog = app.session.board().section_ids()[2];
        app.session.toggle_collapse(backlog).unwrap();
        let mut filter = FilterState::default();
        filter.toggle_status("pending");
        app.session.set_filter(filter.clone());

        let state = app.ui_state();
        assert_eq!(state.collapsed, vec![backlog]);
        assert_eq!(state.filter, filter);

        let (mut fresh, _remote) = demo_app();
        fresh.restore(state);
        assert_eq!(fresh.session.collapsed_sections(), vec![backlog]);
        assert_eq!(fresh.session.filter(), &filter);
    }

    #[test]
    fn state_for_another_project_is_ignored() {
        let (mut app, _remote) = demo_app();
        app.restore(UiState {
            project: 99,
            collapsed: app.session.board().section_ids(),
            filter: FilterState::default(),
        });
        assert!(app.session.collapsed_sections().is_empty());
    }

    #[test]
    fn jump_section_lands_on_first_task() {
        let (mut app, _remote) = demo_app();
        let now = Instant::now();
        let ids = app.session.board().section_ids();
        app.jump_section(1, now);
        assert_eq!(app.current_section(), Some(ids[1]));
        let first = app.session.board().section(ids[1]).unwrap().tasks[0];
        assert_eq!(app.session.selected(), Some(first));

        app.session.toggle_collapse(ids[2]).unwrap();
        app.jump_section(5, now);
        assert_eq!(app.current_section(), Some(ids[2]));
        assert_eq!(app.session.selected(), None);
    }

    #[test]
    fn priority_filter_cycles_through_any() {
        assert_eq!(next_priority(None), Some(Priority::Low));
        assert_eq!(next_priority(Some(Priority::Medium)), Some(Priority::High));
        assert_eq!(next_priority(Some(Priority::High)), None);
    }
}
