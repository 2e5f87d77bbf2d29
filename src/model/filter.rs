use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::task::{Priority, Task};
use super::user::UserId;

/// Inclusive due-date range; either end may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// The active task filter, applied to every expanded section's task fetch
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub assignee: Option<UserId>,
    /// Status keys; compared case-insensitively
    #[serde(default)]
    pub statuses: BTreeSet<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due: DateRange,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.assignee.is_some()
            || !self.statuses.is_empty()
            || self.priority.is_some()
            || !self.due.is_open()
    }

    pub fn has_status_filter(&self) -> bool {
        !self.statuses.is_empty()
    }

    /// Whether a status passes the status part of the filter
    pub fn status_admits(&self, status: &str) -> bool {
        self.statuses.is_empty() || self.statuses.iter().any(|s| s.eq_ignore_ascii_case(status))
    }

    /// Add or remove a status from the filter set
    pub fn toggle_status(&mut self, status: &str) {
        let existing = self
            .statuses
            .iter()
            .find(|s| s.eq_ignore_ascii_case(status))
            .cloned();
        match existing {
            Some(s) => {
                self.statuses.remove(&s);
            }
            None => {
                self.statuses.insert(status.to_string());
            }
        }
    }

    /// Client-side evaluation of the whole filter against a cached task
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(q) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty())
            && !task.name.to_lowercase().contains(&q.to_lowercase())
        {
            return false;
        }
        if let Some(user) = self.assignee
            && !task.assignees.contains(&user)
        {
            return false;
        }
        if let Some(p) = self.priority
            && task.priority != p
        {
            return false;
        }
        if !self.due.is_open() {
            match task.due {
                Some(d) if self.due.contains(d) => {}
                _ => return false,
            }
        }
        self.status_admits(&task.status)
    }

    /// Query parameters for the remote task list call
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        if let Some(s) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            q.push(("search".to_string(), s.to_string()));
        }
        if let Some(a) = self.assignee {
            q.push(("assignee".to_string(), a.to_string()));
        }
        if !self.statuses.is_empty() {
            let joined: Vec<&str> = self.statuses.iter().map(String::as_str).collect();
            q.push(("status".to_string(), joined.join(",")));
        }
        if let Some(p) = self.priority {
            q.push(("priority".to_string(), p.to_string()));
        }
        if let Some(from) = self.due.from {
            q.push(("due_from".to_string(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.due.to {
            q.push(("due_to".to_string(), to.format("%Y-%m-%d").to_string()));
        }
        q
    }
}
