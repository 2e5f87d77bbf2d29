use serde::{Deserialize, Serialize};

use super::task::TaskId;

/// Server-issued section identifier
pub type SectionId = u64;

/// Pagination cursor for a section's task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageCursor {
    /// Last page fetched (0 = nothing fetched yet)
    pub current: u32,
    /// Total pages reported by the server
    pub total: u32,
}

impl PageCursor {
    /// True if the server reported pages that have not been fetched
    pub fn has_more(&self) -> bool {
        self.current < self.total
    }

    pub fn next_page(&self) -> u32 {
        self.current + 1
    }

    pub fn never_fetched(&self) -> bool {
        self.current == 0
    }
}

/// A named, ordered grouping of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub collapsed: bool,

    // --- Client cache state ---
    /// Task ids in display order
    #[serde(skip)]
    pub tasks: Vec<TaskId>,
    #[serde(skip)]
    pub page: PageCursor,
    #[serde(skip)]
    pub loading: bool,
    /// Bumped whenever the filter changes so stale page replies can be dropped
    #[serde(skip)]
    pub generation: u64,
}

impl Section {
    pub fn new(id: SectionId, name: impl Into<String>) -> Self {
        Section {
            id,
            name: name.into(),
            position: 0,
            collapsed: false,
            tasks: Vec::new(),
            page: PageCursor::default(),
            loading: false,
            generation: 0,
        }
    }

    pub fn index_of(&self, task: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| *t == task)
    }

    pub fn is_expanded(&self) -> bool {
        !self.collapsed
    }
}

/// How a section delete treats the section's tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Delete only the section; its tasks move to the first remaining section
    SectionOnly,
    /// Delete the section together with its tasks
    WithTasks,
}

impl DeleteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeleteMode::SectionOnly => "section_only",
            DeleteMode::WithTasks => "with_tasks",
        }
    }
}
