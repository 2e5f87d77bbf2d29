//! The explicit application store.
//!
//! A [`Session`] owns the board cache, filter, selection, active modal, row
//! editors, optimistic ledger and notifications. Every operation mutates
//! local state synchronously and queues the remote calls it needs in an
//! outbox; the host executes them and reports back through
//! [`Session::complete`]. Nothing here performs I/O.

mod editing;
pub mod notice;
mod sections;
mod tasks;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::api::{self, ApiError, Outbound, Remote, Reply, Request, RequestId};
use crate::edit::{RowRegistry, SaveGuard, ValidationError};
use crate::model::{
    Config, DeleteMode, Field, FilterState, PageCursor, SectionId, Task, TaskFields, TaskId, User,
};
use crate::ops::task_ops::OpError;
use crate::optimistic::{FieldClock, Ledger};
use crate::paging::{Line, PageLoader, Window, flatten};
use crate::store::{Board, StoreError};

pub use editing::CursorMove;
pub use notice::{Level, Notice, Notices};

/// Error type for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Op(#[from] OpError),
    #[error("task not found: {0}")]
    UnknownTask(TaskId),
    #[error("section not found: {0}")]
    UnknownSection(SectionId),
    #[error("section name cannot be empty")]
    EmptySectionName,
}

/// The modal dialog currently open, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Help,
    Filter,
    StatusPicker { task: TaskId, cursor: usize },
    AssigneePicker { task: TaskId, cursor: usize },
    DueDate { task: TaskId, input: String },
    ConfirmDelete { task: TaskId },
    ConfirmSectionDelete { section: SectionId, mode: DeleteMode },
    SectionName { section: Option<SectionId>, input: String },
}

/// What started a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOrigin {
    /// Dropdown, toggle or other immediate field change
    Direct,
    /// Debounced text autosave
    Autosave,
    /// Enter/Tab
    Submit,
}

/// Context kept for each outstanding request
#[derive(Debug, Clone)]
enum Inflight {
    Sections,
    Tasks {
        section: SectionId,
        page: u32,
        generation: u64,
    },
    Users,
    NewSection,
    /// Mutation recorded in the ledger under the same request id
    Mutation {
        label: &'static str,
        tasks: Vec<TaskId>,
        /// Rows to drop once the server confirms (deleted tasks)
        forget: Vec<TaskId>,
    },
    Save {
        task: TaskId,
        origin: SaveOrigin,
        stamp: u64,
        sent: TaskFields,
    },
    BulkSave {
        tasks: Vec<TaskId>,
        stamp: u64,
    },
    Create {
        task: TaskId,
        origin: SaveOrigin,
        stamp: u64,
        sent: TaskFields,
    },
}

/// Upper bound on request/completion rounds in [`Session::drive`]
const MAX_DRIVE_ROUNDS: usize = 1_000;

pub struct Session {
    config: Config,
    board: Board,
    filter: FilterState,
    selected: Option<TaskId>,
    modal: Option<Modal>,
    users: Vec<User>,
    rows: RowRegistry,
    ledger: Ledger,
    clock: FieldClock,
    guard: SaveGuard,
    notices: Notices,
    outbox: Vec<Outbound>,
    inflight: HashMap<RequestId, Inflight>,
    next_request: u64,
    next_temp: u64,
    sections_page: PageCursor,
    /// Sections to show collapsed once they arrive (restored UI state)
    collapsed_hint: Vec<SectionId>,
    loader: PageLoader,
    windows: HashMap<SectionId, Window>,
    /// First visible line of the shared scroll container
    scroll: usize,
    viewport: usize,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let notices = Notices::new(Duration::from_secs(config.list.notice_ttl_secs));
        let loader = PageLoader::new(Duration::from_millis(config.list.scroll_debounce_ms));
        Session {
            config,
            board: Board::new(),
            filter: FilterState::default(),
            selected: None,
            modal: None,
            users: Vec::new(),
            rows: RowRegistry::new(),
            ledger: Ledger::new(),
            clock: FieldClock::new(),
            guard: SaveGuard::new(),
            notices,
            outbox: Vec::new(),
            inflight: HashMap::new(),
            next_request: 0,
            next_temp: 0,
            sections_page: PageCursor::default(),
            collapsed_hint: Vec::new(),
            loader,
            windows: HashMap::new(),
            scroll: 0,
            viewport: 20,
        }
    }

    // --- Reads ---

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn selected(&self) -> Option<TaskId> {
        self.selected
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn modal_mut(&mut self) -> Option<&mut Modal> {
        self.modal.as_mut()
    }

    pub fn rows(&self) -> &RowRegistry {
        &self.rows
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut Notices {
        &mut self.notices
    }

    /// True while requests are queued or outstanding
    pub fn is_busy(&self) -> bool {
        !self.inflight.is_empty()
    }

    pub fn pending_requests(&self) -> usize {
        self.inflight.len()
    }

    /// Optimistic mutations awaiting confirmation
    pub fn unconfirmed(&self) -> usize {
        self.ledger.len()
    }

    /// True if a save is in flight for the task
    pub fn is_saving(&self, task: TaskId) -> bool {
        self.guard.is_busy(task)
    }

    /// The draft shown for a task's name: the editor buffer while editing,
    /// otherwise the stored name
    pub fn display_name(&self, task: TaskId) -> Option<&str> {
        if let Some(row) = self.rows.get(task)
            && row.name.is_active()
        {
            return Some(row.name.buffer());
        }
        self.board.task(task).map(|t| t.name.as_str())
    }

    // --- Selection & modal ---

    pub fn select(&mut self, task: Option<TaskId>) {
        self.selected = task.filter(|t| self.board.contains_task(*t));
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) -> Option<Modal> {
        self.modal.take()
    }

    // --- Layout ---

    /// The board as lines of the shared scroll container
    pub fn lines(&self) -> Vec<Line> {
        flatten(
            &self.board,
            self.config.list.virtualize_threshold,
            self.config.list.window_rows,
            &self.windows,
        )
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll
    }

    pub fn set_viewport(&mut self, height: usize) {
        self.viewport = height.max(1);
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn window(&self, section: SectionId) -> Option<&Window> {
        self.windows.get(&section)
    }

    // --- Request plumbing ---

    fn next_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Queue a request under a previously reserved id
    fn send_as(&mut self, id: RequestId, request: Request, ctx: Inflight) {
        tracing::debug!(request = id.0, kind = request.kind(), "request queued");
        self.inflight.insert(id, ctx);
        self.outbox.push(Outbound { id, request });
    }

    fn send(&mut self, request: Request, ctx: Inflight) -> RequestId {
        let id = self.next_id();
        self.send_as(id, request, ctx);
        id
    }

    /// Hand queued requests to the host
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Feed back the result of a request
    pub fn complete(&mut self, id: RequestId, result: Result<Reply, ApiError>, now: Instant) {
        let Some(ctx) = self.inflight.remove(&id) else {
            tracing::warn!(request = id.0, "completion for unknown request");
            return;
        };
        match &result {
            Ok(_) => tracing::debug!(request = id.0, "request completed"),
            Err(e) => tracing::debug!(request = id.0, error = %e, "request failed"),
        }
        match ctx {
            Inflight::Sections => self.on_sections(result, now),
            Inflight::Tasks {
                section,
                page,
                generation,
            } => self.on_tasks(section, page, generation, result, now),
            Inflight::Users => self.on_users(result, now),
            Inflight::NewSection => self.on_new_section(result, now),
            Inflight::Mutation {
                label,
                tasks,
                forget,
            } => self.on_mutation(id, label, tasks, forget, result, now),
            Inflight::Save {
                task,
                origin,
                stamp,
                sent,
            } => self.on_save(id, task, origin, stamp, sent, result, now),
            Inflight::BulkSave { tasks, stamp } => self.on_bulk_save(id, tasks, stamp, result, now),
            Inflight::Create {
                task,
                origin,
                stamp,
                sent,
            } => self.on_create(id, task, origin, stamp, sent, result, now),
        }
    }

    /// Execute queued requests against `remote` until nothing is left.
    /// Used by the CLI and tests; the terminal UI runs requests on a worker
    /// thread instead.
    pub fn drive(&mut self, remote: &dyn Remote, now: Instant) {
        for _ in 0..MAX_DRIVE_ROUNDS {
            let batch = self.drain_outbox();
            if batch.is_empty() {
                return;
            }
            for out in batch {
                let result = api::execute(remote, &out.request);
                self.complete(out.id, result, now);
            }
        }
        tracing::warn!("request loop did not settle");
    }

    /// Advance timers: debounced autosaves, the page loader and notice
    /// expiry
    pub fn tick(&mut self, now: Instant) {
        self.flush_due_edits(now);
        if let Some(section) = self.loader.poll(now, &self.board) {
            self.load_more(section);
        }
        self.notices.expire(now);
    }

    /// Earliest pending timer, for hosts that sleep between ticks
    pub fn next_deadline(&self) -> Option<Instant> {
        self.rows
            .tasks()
            .into_iter()
            .filter_map(|t| self.rows.get(t).and_then(|r| r.name.debounce().deadline()))
            .chain(self.loader.deadline())
            .min()
    }

    /// Turn an operation error into a notification
    pub fn report(&mut self, err: &SessionError, now: Instant) {
        match err {
            SessionError::Validation(e) => self.notices.warn(e.to_string(), now),
            SessionError::EmptySectionName => self.notices.warn(err.to_string(), now),
            other => self.notices.error(other.to_string(), now),
        }
    }

    // --- Shared helpers ---

    fn set_saving(&mut self, tasks: &[TaskId], saving: bool) {
        for id in tasks {
            if let Some(task) = self.board.task_mut(*id) {
                task.saving = saving;
            }
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.config.autosave.debounce_ms)
    }

    /// Drop a task from the local view entirely (rows, stamps, selection)
    fn evict(&mut self, task: TaskId) {
        let _ = self.board.detach_task(task);
        self.rows.remove(task);
        self.clock.forget(task);
        if self.selected == Some(task) {
            self.selected = None;
        }
    }

    /// Fields of a server record adopted into the cache: everything not
    /// written locally after `stamp`
    fn adopt(&mut self, task: TaskId, server: &Task, stamp: u64) -> Vec<Field> {
        let mut kept_local = Vec::new();
        let Some(record) = self.board.task_mut(task) else {
            return kept_local;
        };
        for field in Field::ALL {
            if self.clock.is_current(task, field, stamp) {
                crate::model::set_field(record, server.field_value(field));
            } else {
                kept_local.push(field);
            }
        }
        kept_local
    }
}

fn unexpected(reply: Reply) -> ApiError {
    ApiError::Decode(format!("unexpected reply: {:?}", reply))
}
