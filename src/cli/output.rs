use serde::Serialize;

use crate::model::{Section, StatusCatalog, Task, User};
use crate::ops::search::{MatchField, SearchHit};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct SectionJson {
    pub id: u64,
    pub name: String,
    pub position: u32,
    pub collapsed: bool,
    pub tasks: usize,
    /// True if the server has pages that were not fetched
    pub more: bool,
}

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub name: String,
    pub status: String,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    pub completed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<u64>,
    pub position: u32,
}

#[derive(Serialize)]
pub struct TaskListJson {
    pub section: u64,
    pub name: String,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub section: u64,
    pub task: String,
    pub field: &'static str,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

pub fn section_to_json(section: &Section) -> SectionJson {
    SectionJson {
        id: section.id,
        name: section.name.clone(),
        position: section.position,
        collapsed: section.collapsed,
        tasks: section.tasks.len(),
        more: section.page.has_more(),
    }
}

pub fn task_to_json(task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.to_string(),
        name: task.name.clone(),
        status: task.status.clone(),
        priority: task.priority.to_string(),
        due: task.due.map(|d| d.format("%Y-%m-%d").to_string()),
        completed: task.completed,
        assignees: task.assignees.iter().copied().collect(),
        position: task.position,
    }
}

pub fn field_name(field: &MatchField) -> &'static str {
    match field {
        MatchField::Id => "id",
        MatchField::Name => "name",
        MatchField::Status => "status",
        MatchField::Assignee => "assignee",
    }
}

pub fn hit_to_json(hit: &SearchHit, text: &str) -> SearchHitJson {
    SearchHitJson {
        section: hit.section,
        task: hit.task.to_string(),
        field: field_name(&hit.field),
        text: text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// Format a section listing line: `   3  In Progress (12 tasks)`
pub fn format_section_line(section: &Section) -> String {
    let count = section.tasks.len();
    let more = if section.page.has_more() { "+" } else { "" };
    let noun = if count == 1 { "task" } else { "tasks" };
    format!("{:>4}  {} ({}{} {})", section.id, section.name, count, more, noun)
}

/// Format a single task line: `[ ]   12 Write docs  (In Progress, high)  due 2025-03-01  @Ada`
pub fn format_task_line(task: &Task, statuses: &StatusCatalog, users: &[User]) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let status = statuses
        .get(&task.status)
        .map_or(task.status.as_str(), |s| s.label.as_str());
    let id = task.id.to_string();
    let mut line = format!(
        "{} {:>4} {}  ({}, {})",
        check, id, task.name, status, task.priority
    );
    if let Some(due) = task.due {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d")));
    }
    if !task.assignees.is_empty() {
        let names: Vec<String> = task
            .assignees
            .iter()
            .map(|id| {
                users
                    .iter()
                    .find(|u| u.id == *id)
                    .map_or_else(|| format!("#{}", id), |u| u.name.clone())
            })
            .collect();
        line.push_str(&format!("  @{}", names.join(", @")));
    }
    line
}

/// Format a section header for task listings
pub fn format_section_header(section: &Section) -> String {
    format!("== {} ({}) ==", section.name, section.id)
}
