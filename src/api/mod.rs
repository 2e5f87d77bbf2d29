//! Narrow contract with the remote task/section backend.
//!
//! The engine never calls these traits directly. Session operations emit
//! [`Outbound`] requests; a host executes them with [`execute`] and feeds the
//! result back into the session.

pub mod http;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::{DeleteMode, FilterState, Section, SectionId, Task, TaskFields, User};

/// Error type for remote calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// One page of sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionPage {
    pub sections: Vec<Section>,
    pub page: u32,
    pub total_pages: u32,
}

/// One page of a section's tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub page: u32,
    pub total_pages: u32,
}

/// Remote task API. Ids are server ids; temporary rows never reach it.
pub trait TaskApi {
    fn list_tasks(
        &self,
        section: SectionId,
        page: u32,
        filter: &FilterState,
    ) -> Result<TaskPage, ApiError>;
    fn create_task(&self, section: SectionId, fields: &TaskFields) -> Result<Task, ApiError>;
    fn update_task(&self, task: u64, fields: &TaskFields) -> Result<Task, ApiError>;
    fn delete_task(&self, task: u64) -> Result<(), ApiError>;
    fn reorder_tasks(&self, section: SectionId, ordered: &[u64]) -> Result<(), ApiError>;
    fn move_task(
        &self,
        task: u64,
        from: SectionId,
        to: SectionId,
        dest_index: usize,
    ) -> Result<(), ApiError>;
    fn bulk_delete(&self, tasks: &[u64]) -> Result<(), ApiError>;
    fn bulk_update(&self, tasks: &[u64], fields: &TaskFields) -> Result<Vec<Task>, ApiError>;
}

/// Remote section API
pub trait SectionApi {
    fn list_sections(&self, project: u64, page: u32) -> Result<SectionPage, ApiError>;
    fn create_section(&self, project: u64, name: &str) -> Result<Section, ApiError>;
    fn rename_section(&self, section: SectionId, name: &str) -> Result<Section, ApiError>;
    fn delete_section(&self, section: SectionId, mode: DeleteMode) -> Result<(), ApiError>;
    fn reorder_sections(&self, project: u64, ordered: &[SectionId]) -> Result<(), ApiError>;
}

/// Read-only assignee directory
pub trait UserDirectory {
    fn users(&self, project: u64) -> Result<Vec<User>, ApiError>;
}

/// Everything the engine needs from the backend
pub trait Remote: TaskApi + SectionApi + UserDirectory {}

impl<T: TaskApi + SectionApi + UserDirectory> Remote for T {}

/// A backend that can be handed to a worker thread
pub type SharedRemote = Box<dyn Remote + Send>;

/// Identifies an outbound request so its completion can be routed back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// A remote call the engine wants made
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ListSections { project: u64, page: u32 },
    CreateSection { project: u64, name: String },
    RenameSection { section: SectionId, name: String },
    DeleteSection { section: SectionId, mode: DeleteMode },
    ReorderSections { project: u64, ordered: Vec<SectionId> },
    ListTasks { section: SectionId, page: u32, filter: FilterState },
    CreateTask { section: SectionId, fields: TaskFields },
    /// `force` skips duplicate detection: the call is made even if the
    /// fields match what the server already has
    UpdateTask { task: u64, fields: TaskFields, force: bool },
    DeleteTask { task: u64 },
    ReorderTasks { section: SectionId, ordered: Vec<u64> },
    MoveTask { task: u64, from: SectionId, to: SectionId, dest_index: usize },
    BulkDelete { tasks: Vec<u64> },
    BulkUpdate { tasks: Vec<u64>, fields: TaskFields },
    ListUsers { project: u64 },
}

impl Request {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Request::ListSections { .. } => "list_sections",
            Request::CreateSection { .. } => "create_section",
            Request::RenameSection { .. } => "rename_section",
            Request::DeleteSection { .. } => "delete_section",
            Request::ReorderSections { .. } => "reorder_sections",
            Request::ListTasks { .. } => "list_tasks",
            Request::CreateTask { .. } => "create_task",
            Request::UpdateTask { .. } => "update_task",
            Request::DeleteTask { .. } => "delete_task",
            Request::ReorderTasks { .. } => "reorder_tasks",
            Request::MoveTask { .. } => "move_task",
            Request::BulkDelete { .. } => "bulk_delete",
            Request::BulkUpdate { .. } => "bulk_update",
            Request::ListUsers { .. } => "list_users",
        }
    }
}

/// A request tagged with its id
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub id: RequestId,
    pub request: Request,
}

/// Successful result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Sections(SectionPage),
    Section(Section),
    Tasks(TaskPage),
    Task(Task),
    TaskList(Vec<Task>),
    Users(Vec<User>),
}

/// Execute one request against a remote
pub fn execute(remote: &dyn Remote, request: &Request) -> Result<Reply, ApiError> {
    match request {
        Request::ListSections { project, page } => {
            remote.list_sections(*project, *page).map(Reply::Sections)
        }
        Request::CreateSection { project, name } => {
            remote.create_section(*project, name).map(Reply::Section)
        }
        Request::RenameSection { section, name } => {
            remote.rename_section(*section, name).map(Reply::Section)
        }
        Request::DeleteSection { section, mode } => {
            remote.delete_section(*section, *mode).map(|_| Reply::Ack)
        }
        Request::ReorderSections { project, ordered } => {
            remote.reorder_sections(*project, ordered).map(|_| Reply::Ack)
        }
        Request::ListTasks {
            section,
            page,
            filter,
        } => remote.list_tasks(*section, *page, filter).map(Reply::Tasks),
        Request::CreateTask { section, fields } => {
            remote.create_task(*section, fields).map(Reply::Task)
        }
        Request::UpdateTask { task, fields, .. } => {
            remote.update_task(*task, fields).map(Reply::Task)
        }
        Request::DeleteTask { task } => remote.delete_task(*task).map(|_| Reply::Ack),
        Request::ReorderTasks { section, ordered } => {
            remote.reorder_tasks(*section, ordered).map(|_| Reply::Ack)
        }
        Request::MoveTask {
            task,
            from,
            to,
            dest_index,
        } => remote
            .move_task(*task, *from, *to, *dest_index)
            .map(|_| Reply::Ack),
        Request::BulkDelete { tasks } => remote.bulk_delete(tasks).map(|_| Reply::Ack),
        Request::BulkUpdate { tasks, fields } => {
            remote.bulk_update(tasks, fields).map(Reply::TaskList)
        }
        Request::ListUsers { project } => remote.users(*project).map(Reply::Users),
    }
}
