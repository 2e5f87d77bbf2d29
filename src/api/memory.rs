//! In-process backend used by tests and by `--demo`.
//!
//! Behaves like the REST service: server ids, paging, filter evaluation,
//! partial-list reorders. Failures can be injected per call kind.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{Duration, Local};

use super::{ApiError, SectionApi, SectionPage, TaskApi, TaskPage, UserDirectory};
use crate::model::{
    DeleteMode, FilterState, Priority, Section, SectionId, Task, TaskFields, TaskId, User,
};

#[derive(Debug, Default)]
struct MemoryState {
    sections: Vec<Section>,
    /// Ordered server task ids per section
    order: HashMap<SectionId, Vec<u64>>,
    tasks: HashMap<u64, Task>,
    users: Vec<User>,
    next_section: SectionId,
    next_task: u64,
    calls: Vec<String>,
    fail_next: usize,
    fail_kinds: HashSet<String>,
}

/// Thread-safe in-memory backend
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    page_size: u32,
    default_status: String,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new(25)
    }
}

impl MemoryRemote {
    pub fn new(page_size: u32) -> Self {
        MemoryRemote {
            state: Mutex::new(MemoryState {
                next_section: 1,
                next_task: 1,
                ..Default::default()
            }),
            page_size: page_size.max(1),
            default_status: "pending".to_string(),
        }
    }

    /// A backend seeded with a small sample project
    pub fn demo(page_size: u32) -> Self {
        let remote = Self::new(page_size);
        let today = Local::now().date_naive();
        let todo = remote.seed_section("To Do");
        let doing = remote.seed_section("In Progress");
        let backlog = remote.seed_section("Backlog");
        remote.seed_user("Ada Lovelace");
        remote.seed_user("Grace Hopper");
        remote.seed_user("Edsger Dijkstra");

        for (name, priority, days) in [
            ("Write release notes", Priority::High, Some(2)),
            ("Review open pull requests", Priority::Medium, Some(1)),
            ("Update onboarding guide", Priority::Low, None),
        ] {
            remote.seed_task(todo, name, |t| {
                t.priority = priority;
                t.due = days.map(|d| today + Duration::days(d));
                t.assignees.insert(1);
            });
        }
        remote.seed_task(doing, "Migrate billing service", |t| {
            t.priority = Priority::High;
            t.status = "in_progress".into();
            t.assignees.insert(2);
        });
        for i in 1..=45 {
            remote.seed_task(backlog, &format!("Backlog item {}", i), |t| {
                t.priority = if i % 7 == 0 {
                    Priority::High
                } else {
                    Priority::Low
                };
            });
        }
        remote
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, ApiError> {
        self.state
            .lock()
            .map_err(|_| ApiError::Network("backend state poisoned".into()))
    }

    /// Start a call: record it and apply any injected failure
    fn begin(&self, kind: &str) -> Result<std::sync::MutexGuard<'_, MemoryState>, ApiError> {
        let mut state = self.lock()?;
        state.calls.push(kind.to_string());
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(ApiError::Network(format!("{} failed (injected)", kind)));
        }
        if state.fail_kinds.contains(kind) {
            return Err(ApiError::Network(format!("{} failed (injected)", kind)));
        }
        Ok(state)
    }

    pub fn seed_section(&self, name: &str) -> SectionId {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let id = state.next_section;
        state.next_section += 1;
        let mut section = Section::new(id, name);
        section.position = state.sections.len() as u32;
        state.sections.push(section);
        state.order.insert(id, Vec::new());
        id
    }

    pub fn seed_user(&self, name: &str) -> u64 {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let id = state.users.len() as u64 + 1;
        state.users.push(User {
            id,
            name: name.to_string(),
            avatar_url: None,
        });
        id
    }

    pub fn seed_task(&self, section: SectionId, name: &str, edit: impl FnOnce(&mut Task)) -> u64 {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let id = state.next_task;
        state.next_task += 1;
        let mut task = Task::temporary(TaskId::Server(id), &self.default_status);
        task.name = name.to_string();
        task.initial = false;
        edit(&mut task);
        state.tasks.insert(id, task);
        state.order.entry(section).or_default().push(id);
        id
    }

    /// Fail the next `n` calls of any kind
    pub fn fail_next(&self, n: usize) {
        if let Ok(mut state) = self.lock() {
            state.fail_next = n;
        }
    }

    /// Fail every call of the given kind (e.g. `"reorder_tasks"`) until cleared
    pub fn fail_on(&self, kind: &str) {
        if let Ok(mut state) = self.lock() {
            state.fail_kinds.insert(kind.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.lock() {
            state.fail_next = 0;
            state.fail_kinds.clear();
        }
    }

    /// Names of the calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, kind: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == kind).count()
    }

    /// Server-side task order of a section
    pub fn task_order(&self, section: SectionId) -> Vec<u64> {
        self.lock()
            .ok()
            .and_then(|s| s.order.get(&section).cloned())
            .unwrap_or_default()
    }

    pub fn task(&self, id: u64) -> Option<Task> {
        self.lock().ok().and_then(|s| s.tasks.get(&id).cloned())
    }

    pub fn section_order(&self) -> Vec<SectionId> {
        self.lock()
            .map(|s| s.sections.iter().map(|sec| sec.id).collect())
            .unwrap_or_default()
    }
}

fn page_bounds(len: usize, page: u32, page_size: u32) -> (usize, usize, u32) {
    let size = page_size as usize;
    let total_pages = len.div_ceil(size).max(1) as u32;
    let start = (page.saturating_sub(1) as usize * size).min(len);
    let end = (start + size).min(len);
    (start, end, total_pages)
}

/// Place `ordered` into the slots those ids already occupy in `list`.
/// Ids not in `ordered` keep their slots, so partial (filtered) lists work.
fn reorder_partial<T: Copy + PartialEq + std::fmt::Display>(
    list: &mut [T],
    ordered: &[T],
) -> Result<(), ApiError> {
    let mut slots = Vec::with_capacity(ordered.len());
    for id in ordered {
        let slot = list
            .iter()
            .position(|x| x == id)
            .ok_or_else(|| ApiError::NotFound(format!("id {}", id)))?;
        slots.push(slot);
    }
    slots.sort_unstable();
    for (slot, id) in slots.into_iter().zip(ordered) {
        list[slot] = *id;
    }
    Ok(())
}

impl TaskApi for MemoryRemote {
    fn list_tasks(
        &self,
        section: SectionId,
        page: u32,
        filter: &FilterState,
    ) -> Result<TaskPage, ApiError> {
        let state = self.begin("list_tasks")?;
        let order = state
            .order
            .get(&section)
            .ok_or_else(|| ApiError::NotFound(format!("section {}", section)))?;
        let matching: Vec<Task> = order
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                state.tasks.get(id).map(|t| {
                    let mut t = t.clone();
                    t.position = i as u32;
                    t
                })
            })
            .filter(|t| filter.matches(t))
            .collect();
        let (start, end, total_pages) = page_bounds(matching.len(), page, self.page_size);
        Ok(TaskPage {
            tasks: matching[start..end].to_vec(),
            page,
            total_pages,
        })
    }

    fn create_task(&self, section: SectionId, fields: &TaskFields) -> Result<Task, ApiError> {
        let mut state = self.begin("create_task")?;
        if !state.order.contains_key(&section) {
            return Err(ApiError::NotFound(format!("section {}", section)));
        }
        if fields.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(ApiError::Rejected {
                status: 422,
                message: "name is required".into(),
            });
        }
        let id = state.next_task;
        state.next_task += 1;
        let mut task = Task::temporary(TaskId::Server(id), &self.default_status);
        task.initial = false;
        fields.apply_to(&mut task);
        let order = state.order.entry(section).or_default();
        task.position = order.len() as u32;
        order.push(id);
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    fn update_task(&self, task: u64, fields: &TaskFields) -> Result<Task, ApiError> {
        let mut state = self.begin("update_task")?;
        let t = state
            .tasks
            .get_mut(&task)
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task)))?;
        fields.apply_to(t);
        Ok(t.clone())
    }

    fn delete_task(&self, task: u64) -> Result<(), ApiError> {
        let mut state = self.begin("delete_task")?;
        if state.tasks.remove(&task).is_none() {
            return Err(ApiError::NotFound(format!("task {}", task)));
        }
        for order in state.order.values_mut() {
            order.retain(|id| *id != task);
        }
        Ok(())
    }

    fn reorder_tasks(&self, section: SectionId, ordered: &[u64]) -> Result<(), ApiError> {
        let mut state = self.begin("reorder_tasks")?;
        let order = state
            .order
            .get_mut(&section)
            .ok_or_else(|| ApiError::NotFound(format!("section {}", section)))?;
        reorder_partial(order, ordered)
    }

    fn move_task(
        &self,
        task: u64,
        from: SectionId,
        to: SectionId,
        dest_index: usize,
    ) -> Result<(), ApiError> {
        let mut state = self.begin("move_task")?;
        if !state.order.contains_key(&to) {
            return Err(ApiError::NotFound(format!("section {}", to)));
        }
        let source = state
            .order
            .get_mut(&from)
            .ok_or_else(|| ApiError::NotFound(format!("section {}", from)))?;
        let idx = source
            .iter()
            .position(|id| *id == task)
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task)))?;
        source.remove(idx);
        let dest = state.order.entry(to).or_default();
        let at = dest_index.min(dest.len());
        dest.insert(at, task);
        Ok(())
    }

    fn bulk_delete(&self, tasks: &[u64]) -> Result<(), ApiError> {
        let mut state = self.begin("bulk_delete")?;
        if let Some(missing) = tasks.iter().find(|id| !state.tasks.contains_key(*id)) {
            return Err(ApiError::NotFound(format!("task {}", missing)));
        }
        for id in tasks {
            state.tasks.remove(id);
        }
        for order in state.order.values_mut() {
            order.retain(|id| !tasks.contains(id));
        }
        Ok(())
    }

    fn bulk_update(&self, tasks: &[u64], fields: &TaskFields) -> Result<Vec<Task>, ApiError> {
        let mut state = self.begin("bulk_update")?;
        if let Some(missing) = tasks.iter().find(|id| !state.tasks.contains_key(*id)) {
            return Err(ApiError::NotFound(format!("task {}", missing)));
        }
        let mut out = Vec::with_capacity(tasks.len());
        for id in tasks {
            if let Some(t) = state.tasks.get_mut(id) {
                fields.apply_to(t);
                out.push(t.clone());
            }
        }
        Ok(out)
    }
}

impl SectionApi for MemoryRemote {
    fn list_sections(&self, _project: u64, page: u32) -> Result<SectionPage, ApiError> {
        let state = self.begin("list_sections")?;
        let (start, end, total_pages) = page_bounds(state.sections.len(), page, self.page_size);
        let sections = state.sections[start..end]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut s = s.clone();
                s.position = (start + i) as u32;
                s
            })
            .collect();
        Ok(SectionPage {
            sections,
            page,
            total_pages,
        })
    }

    fn create_section(&self, _project: u64, name: &str) -> Result<Section, ApiError> {
        let mut state = self.begin("create_section")?;
        let id = state.next_section;
        state.next_section += 1;
        let mut section = Section::new(id, name);
        section.position = state.sections.len() as u32;
        state.sections.push(section.clone());
        state.order.insert(id, Vec::new());
        Ok(section)
    }

    fn rename_section(&self, section: SectionId, name: &str) -> Result<Section, ApiError> {
        let mut state = self.begin("rename_section")?;
        let s = state
            .sections
            .iter_mut()
            .find(|s| s.id == section)
            .ok_or_else(|| ApiError::NotFound(format!("section {}", section)))?;
        s.name = name.to_string();
        Ok(s.clone())
    }

    fn delete_section(&self, section: SectionId, mode: DeleteMode) -> Result<(), ApiError> {
        let mut state = self.begin("delete_section")?;
        let idx = state
            .sections
            .iter()
            .position(|s| s.id == section)
            .ok_or_else(|| ApiError::NotFound(format!("section {}", section)))?;
        state.sections.remove(idx);
        let tasks = state.order.remove(&section).unwrap_or_default();
        match mode {
            DeleteMode::WithTasks => {
                for id in tasks {
                    state.tasks.remove(&id);
                }
            }
            DeleteMode::SectionOnly => {
                let target = state.sections.first().map(|s| s.id).ok_or_else(|| {
                    ApiError::Rejected {
                        status: 409,
                        message: "cannot keep tasks: no other section".into(),
                    }
                })?;
                state.order.entry(target).or_default().extend(tasks);
            }
        }
        Ok(())
    }

    fn reorder_sections(&self, _project: u64, ordered: &[SectionId]) -> Result<(), ApiError> {
        let mut state = self.begin("reorder_sections")?;
        let mut ids: Vec<SectionId> = state.sections.iter().map(|s| s.id).collect();
        reorder_partial(&mut ids, ordered)?;
        let mut by_id: HashMap<SectionId, Section> =
            state.sections.drain(..).map(|s| (s.id, s)).collect();
        for (i, id) in ids.iter().enumerate() {
            if let Some(mut s) = by_id.remove(id) {
                s.position = i as u32;
                state.sections.push(s);
            }
        }
        Ok(())
    }
}

impl UserDirectory for MemoryRemote {
    fn users(&self, _project: u64) -> Result<Vec<User>, ApiError> {
        let state = self.begin("list_users")?;
        Ok(state.users.clone())
    }
}
