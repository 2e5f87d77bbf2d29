use std::time::Instant;

use super::{Inflight, Session, SessionError, unexpected};
use crate::api::{ApiError, Reply, Request, RequestId};
use crate::model::{DeleteMode, FilterState, PageCursor, SectionId, TaskId};
use crate::ops::section_ops::{plan_section_delete, plan_section_rename, plan_section_reorder};
use crate::optimistic::Mutation;
use crate::paging::{Line, ScrollAnchor, SectionLayout, Window, next_section_to_load};

/// Rows from the end of the loaded rows at which the next page is requested
const NEAR_END_ROWS: usize = 3;

impl Session {
    // ---------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------

    /// Request the next page of the section list
    pub fn load_sections(&mut self) -> RequestId {
        let page = self.sections_page.next_page();
        let project = self.config.server.project;
        self.send(Request::ListSections { project, page }, Inflight::Sections)
    }

    pub fn load_users(&mut self) -> RequestId {
        let project = self.config.server.project;
        self.send(Request::ListUsers { project }, Inflight::Users)
    }

    fn load_tasks(&mut self, section: SectionId, page: u32) -> Option<RequestId> {
        let sec = self.board.section_mut(section)?;
        sec.loading = true;
        let generation = sec.generation;
        let filter = self.filter.clone();
        Some(self.send(
            Request::ListTasks {
                section,
                page,
                filter,
            },
            Inflight::Tasks {
                section,
                page,
                generation,
            },
        ))
    }

    /// Fetch the next page of an expanded section, unless one is already
    /// loading or every page is in
    pub fn load_more(&mut self, section: SectionId) -> Option<RequestId> {
        let sec = self.board.section(section)?;
        if !sec.is_expanded() || sec.loading || !sec.page.has_more() {
            return None;
        }
        let page = sec.page.next_page();
        self.load_tasks(section, page)
    }

    pub(super) fn on_sections(&mut self, result: Result<Reply, ApiError>, now: Instant) {
        let page = match result.and_then(|reply| match reply {
            Reply::Sections(p) => Ok(p),
            other => Err(unexpected(other)),
        }) {
            Ok(page) => page,
            Err(e) => {
                self.notices
                    .error(format!("Could not load sections: {}", e), now);
                return;
            }
        };
        for mut section in page.sections {
            if self.board.section(section.id).is_none() && self.collapsed_hint.contains(&section.id) {
                section.collapsed = true;
            }
            self.board.upsert_section(section);
        }
        self.sections_page = PageCursor {
            current: page.page,
            total: page.total_pages,
        };
        if self.sections_page.has_more() {
            self.load_sections();
        }
        let unfetched: Vec<SectionId> = self
            .board
            .sections()
            .filter(|s| s.is_expanded() && s.page.never_fetched() && !s.loading)
            .map(|s| s.id)
            .collect();
        for section in unfetched {
            self.load_tasks(section, 1);
        }
    }

    pub(super) fn on_tasks(
        &mut self,
        section: SectionId,
        page: u32,
        generation: u64,
        result: Result<Reply, ApiError>,
        now: Instant,
    ) {
        let Some(sec) = self.board.section(section) else {
            tracing::debug!(section, "task page for a removed section dropped");
            return;
        };
        if sec.generation != generation {
            tracing::debug!(section, page, "stale task page dropped");
            return;
        }
        let result = result.and_then(|reply| match reply {
            Reply::Tasks(p) => Ok(p),
            other => Err(unexpected(other)),
        });
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                if let Some(sec) = self.board.section_mut(section) {
                    sec.loading = false;
                }
                self.notices
                    .error(format!("Could not load tasks: {}", e), now);
                return;
            }
        };
        let anchor = ScrollAnchor::capture(&self.lines(), self.scroll);
        match self.board.append_page(section, fetched.tasks) {
            Ok(added) => tracing::debug!(section, page, added, "task page loaded"),
            Err(e) => tracing::warn!(section, error = %e, "task page could not be applied"),
        }
        if let Some(sec) = self.board.section_mut(section) {
            sec.loading = false;
            sec.page = PageCursor {
                current: fetched.page.max(page),
                total: fetched.total_pages,
            };
        }
        if let Some(at) = anchor.and_then(|a| a.restore(&self.lines())) {
            self.scroll = at;
        }
    }

    pub(super) fn on_users(&mut self, result: Result<Reply, ApiError>, now: Instant) {
        match result {
            Ok(Reply::Users(users)) => self.users = users,
            Ok(other) => self.notices.error(unexpected(other).to_string(), now),
            Err(e) => self
                .notices
                .error(format!("Could not load users: {}", e), now),
        }
    }

    pub(super) fn on_new_section(&mut self, result: Result<Reply, ApiError>, now: Instant) {
        match result {
            Ok(Reply::Section(mut section)) => {
                // A new section is empty: nothing left to fetch
                section.page = PageCursor {
                    current: 1,
                    total: 1,
                };
                tracing::info!(section = section.id, name = %section.name, "section created");
                self.board.upsert_section(section);
            }
            Ok(other) => self.notices.error(unexpected(other).to_string(), now),
            Err(e) => self
                .notices
                .error(format!("Could not create section: {}", e), now),
        }
    }

    // ---------------------------------------------------------------------
    // Scrolling & selection
    // ---------------------------------------------------------------------

    /// Scroll the shared container. Nearing the bottom arms the page loader.
    pub fn scroll_by(&mut self, delta: isize, now: Instant) {
        let len = self.lines().len();
        let max = len.saturating_sub(self.viewport);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
        self.arm_if_near_bottom(len, now);
    }

    fn arm_if_near_bottom(&mut self, len: usize, now: Instant) {
        let bottom = self.scroll + self.viewport;
        if bottom + NEAR_END_ROWS >= len && next_section_to_load(&self.board).is_some() {
            self.loader.near_bottom(now);
        }
    }

    /// Scroll a windowed section's own region
    pub fn scroll_section(&mut self, section: SectionId, delta: isize) -> Option<RequestId> {
        let len = self.board.section(section)?.tasks.len();
        if SectionLayout::for_len(len, self.config.list.virtualize_threshold) == SectionLayout::Full {
            return None;
        }
        let rows = self.config.list.window_rows;
        let window = self.windows.entry(section).or_insert_with(|| Window::new(rows));
        window.scroll_by(delta, len);
        if window.near_end(len, NEAR_END_ROWS) {
            return self.load_more(section);
        }
        None
    }

    /// Move the selection by `delta` tasks across expanded sections
    pub fn move_selection(&mut self, delta: isize, now: Instant) {
        let order: Vec<TaskId> = self
            .board
            .sections()
            .filter(|s| s.is_expanded())
            .flat_map(|s| s.tasks.iter().copied())
            .collect();
        if order.is_empty() {
            self.selected = None;
            return;
        }
        let last = order.len() - 1;
        let next = match self.selected.and_then(|t| order.iter().position(|x| *x == t)) {
            Some(i) => i.saturating_add_signed(delta).min(last),
            None => 0,
        };
        let task = order[next];
        self.selected = Some(task);
        self.reveal(task, now);
    }

    /// Scroll so `task` is visible, sliding its section window if needed
    pub fn reveal(&mut self, task: TaskId, now: Instant) {
        let Some((section, index)) = self.board.locate(task) else {
            return;
        };
        let len = self.board.section(section).map_or(0, |s| s.tasks.len());
        if SectionLayout::for_len(len, self.config.list.virtualize_threshold)
            == SectionLayout::Windowed
        {
            let rows = self.config.list.window_rows;
            let window = self.windows.entry(section).or_insert_with(|| Window::new(rows));
            window.reveal(index);
            if window.near_end(len, NEAR_END_ROWS) {
                self.load_more(section);
            }
        }
        self.keep_visible(Line::Task(task), now);
    }

    /// Scroll so a section's header is visible
    pub fn reveal_section(&mut self, section: SectionId, now: Instant) {
        self.keep_visible(Line::Header(section), now);
    }

    fn keep_visible(&mut self, line: Line, now: Instant) {
        let lines = self.lines();
        if let Some(at) = lines.iter().position(|l| *l == line) {
            if at < self.scroll {
                self.scroll = at;
            } else if at >= self.scroll + self.viewport {
                self.scroll = at + 1 - self.viewport;
            }
        }
        self.arm_if_near_bottom(lines.len(), now);
    }

    // ---------------------------------------------------------------------
    // Collapse
    // ---------------------------------------------------------------------

    /// Collapse or expand a section. Expanding a section that was never
    /// fetched requests its first page.
    pub fn toggle_collapse(&mut self, section: SectionId) -> Result<Option<RequestId>, SessionError> {
        let sec = self
            .board
            .section_mut(section)
            .ok_or(SessionError::UnknownSection(section))?;
        sec.collapsed = !sec.collapsed;
        let collapsed = sec.collapsed;
        let fetch = !collapsed && sec.page.never_fetched() && !sec.loading;
        if collapsed && self.selected.is_some_and(|t| self.board.owner(t) == Some(section)) {
            self.selected = None;
        }
        Ok(if fetch {
            self.load_tasks(section, 1)
        } else {
            None
        })
    }

    pub fn collapsed_sections(&self) -> Vec<SectionId> {
        self.board
            .sections()
            .filter(|s| s.collapsed)
            .map(|s| s.id)
            .collect()
    }

    /// Sections to show collapsed (restored UI state). Applies to sections
    /// already loaded and to ones still to arrive.
    pub fn restore_collapsed(&mut self, sections: Vec<SectionId>) {
        for id in &sections {
            if let Some(sec) = self.board.section_mut(*id) {
                sec.collapsed = true;
            }
        }
        self.collapsed_hint = sections;
    }

    // ---------------------------------------------------------------------
    // Section CRUD
    // ---------------------------------------------------------------------

    /// Create a section; it appears once the server confirms
    pub fn create_section(&mut self, name: &str) -> Result<RequestId, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptySectionName);
        }
        let project = self.config.server.project;
        Ok(self.send(
            Request::CreateSection {
                project,
                name: name.to_string(),
            },
            Inflight::NewSection,
        ))
    }

    pub fn rename_section(
        &mut self,
        section: SectionId,
        name: &str,
    ) -> Result<Option<RequestId>, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptySectionName);
        }
        let Some(mutation) = plan_section_rename(&self.board, section, name)? else {
            return Ok(None);
        };
        let request = Request::RenameSection {
            section,
            name: name.to_string(),
        };
        Ok(Some(self.send_section_mutation(mutation, request, "rename section")?))
    }

    pub fn reorder_section(
        &mut self,
        section: SectionId,
        to: usize,
    ) -> Result<Option<RequestId>, SessionError> {
        let Some(mutation) = plan_section_reorder(&self.board, section, to)? else {
            return Ok(None);
        };
        let mut scratch = self.board.clone();
        mutation.apply(&mut scratch)?;
        let request = Request::ReorderSections {
            project: self.config.server.project,
            ordered: scratch.section_ids(),
        };
        Ok(Some(self.send_section_mutation(mutation, request, "reorder sections")?))
    }

    /// Delete a section. `SectionOnly` hands its tasks to the first
    /// remaining section; `WithTasks` drops them.
    pub fn delete_section(
        &mut self,
        section: SectionId,
        mode: DeleteMode,
    ) -> Result<RequestId, SessionError> {
        let (mutation, target) = plan_section_delete(&self.board, section, mode)?;
        if let Some(target) = target {
            tracing::debug!(section, target, "section tasks handed over");
        }
        if self.selected.is_some_and(|t| self.board.owner(t) == Some(section))
            && mode == DeleteMode::WithTasks
        {
            self.selected = None;
        }
        self.windows.remove(&section);
        self.send_section_mutation(mutation, Request::DeleteSection { section, mode }, "delete section")
    }

    fn send_section_mutation(
        &mut self,
        mutation: Mutation,
        request: Request,
        label: &'static str,
    ) -> Result<RequestId, SessionError> {
        mutation.apply(&mut self.board)?;
        let tasks = mutation.tasks();
        let forget = match &mutation {
            Mutation::RemoveSection { tasks, .. } => tasks.iter().map(|t| t.id).collect(),
            _ => Vec::new(),
        };
        let id = self.next_id();
        self.ledger.record(id, mutation, 0);
        self.set_saving(&tasks, true);
        self.send_as(
            id,
            request,
            Inflight::Mutation {
                label,
                tasks,
                forget,
            },
        );
        Ok(id)
    }

    // ---------------------------------------------------------------------
    // Filter
    // ---------------------------------------------------------------------

    /// Replace the filter and refetch every expanded section from page 1.
    ///
    /// Pages already in flight are discarded when they arrive. Temporary
    /// rows, rows with a save in flight and rows being edited stay.
    pub fn set_filter(&mut self, filter: FilterState) {
        if filter == self.filter {
            return;
        }
        tracing::debug!(active = filter.is_active(), "filter changed");
        self.filter = filter;
        self.loader.cancel();
        self.windows.clear();
        self.scroll = 0;
        let rows = &self.rows;
        let mut dropped = Vec::new();
        for id in self.board.section_ids() {
            if let Some(sec) = self.board.section_mut(id) {
                sec.generation += 1;
                sec.loading = false;
                sec.page = PageCursor::default();
            }
            let kept = self.board.clear_section_tasks(id, |t| {
                t.id.is_temp() || t.saving || rows.get(t.id).is_some_and(|r| r.name.is_active())
            });
            match kept {
                Ok(ids) => dropped.extend(ids),
                Err(e) => tracing::warn!(section = id, error = %e, "could not clear section"),
            }
        }
        for task in dropped {
            self.rows.remove(task);
            self.clock.forget(task);
        }
        if self.selected.is_some_and(|t| !self.board.contains_task(t)) {
            self.selected = None;
        }
        let expanded: Vec<SectionId> = self
            .board
            .sections()
            .filter(|s| s.is_expanded())
            .map(|s| s.id)
            .collect();
        for section in expanded {
            self.load_tasks(section, 1);
        }
    }
}
