use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Identity of a task row.
///
/// Rows added in the UI start as `Temp` until the server confirms creation
/// and issues a real id. A `Temp` id is never sent to the remote API.
///
/// On the wire a server id is a plain number and a temporary id is the
/// string `tmp-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "IdRepr", into = "IdRepr")]
pub enum TaskId {
    Temp(u64),
    Server(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Num(u64),
    Text(String),
}

impl From<TaskId> for IdRepr {
    fn from(id: TaskId) -> Self {
        match id {
            TaskId::Server(n) => IdRepr::Num(n),
            TaskId::Temp(_) => IdRepr::Text(id.to_string()),
        }
    }
}

impl TryFrom<IdRepr> for TaskId {
    type Error = String;

    fn try_from(repr: IdRepr) -> Result<Self, Self::Error> {
        match repr {
            IdRepr::Num(n) => Ok(TaskId::Server(n)),
            IdRepr::Text(s) => s.parse(),
        }
    }
}

impl TaskId {
    pub fn is_temp(self) -> bool {
        matches!(self, TaskId::Temp(_))
    }

    /// The server-issued id, if this task has been persisted
    pub fn server(self) -> Option<u64> {
        match self {
            TaskId::Server(id) => Some(id),
            TaskId::Temp(_) => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Temp(n) => write!(f, "tmp-{}", n),
            TaskId::Server(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("tmp-") {
            return n
                .parse()
                .map(TaskId::Temp)
                .map_err(|_| format!("invalid task id: {}", s));
        }
        s.parse()
            .map(TaskId::Server)
            .map_err(|_| format!("invalid task id: {}", s))
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Cycle low → medium → high → low (the priority dropdown shortcut)
    pub fn next(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("invalid priority: {} (expected low, medium or high)", s)),
        }
    }
}

/// One entry in the project-defined status set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDef {
    pub key: String,
    pub label: String,
    /// Hex color, e.g. `#44ff88`
    pub color: String,
    /// Marks the completion status (toggle target)
    #[serde(default)]
    pub done: bool,
    /// Marks the status a reopened task returns to
    #[serde(default)]
    pub default: bool,
}

/// The project-defined status set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCatalog {
    pub statuses: Vec<StatusDef>,
}

impl Default for StatusCatalog {
    fn default() -> Self {
        let def = |key: &str, label: &str, color: &str, done: bool, default: bool| StatusDef {
            key: key.into(),
            label: label.into(),
            color: color.into(),
            done,
            default,
        };
        StatusCatalog {
            statuses: vec![
                def("pending", "Pending", "#b0aaff", false, true),
                def("in_progress", "In Progress", "#44ddff", false, false),
                def("completed", "Completed", "#44ff88", true, false),
            ],
        }
    }
}

impl StatusCatalog {
    /// Look up a status by key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&StatusDef> {
        self.statuses
            .iter()
            .find(|s| s.key.eq_ignore_ascii_case(key))
    }

    /// Key of the completion status
    pub fn done_key(&self) -> &str {
        self.statuses
            .iter()
            .find(|s| s.done)
            .or_else(|| self.statuses.last())
            .map_or("completed", |s| s.key.as_str())
    }

    /// Key of the status a task gets when created or reopened
    pub fn default_key(&self) -> &str {
        self.statuses
            .iter()
            .find(|s| s.default)
            .or_else(|| self.statuses.first())
            .map_or("pending", |s| s.key.as_str())
    }

    pub fn is_done(&self, key: &str) -> bool {
        self.done_key().eq_ignore_ascii_case(key)
    }
}

/// A task as held in the client cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub assignees: BTreeSet<UserId>,
    pub priority: Priority,
    pub status: String,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    /// Ordinal position within the owning section
    #[serde(default)]
    pub position: u32,

    // --- Transient client state ---
    /// Temporary row not yet persisted
    #[serde(skip)]
    pub initial: bool,
    /// A request touching this task is in flight
    #[serde(skip)]
    pub saving: bool,
}

impl Task {
    /// A fresh temporary row with an empty name
    pub fn temporary(id: TaskId, status: &str) -> Self {
        Task {
            id,
            name: String::new(),
            assignees: BTreeSet::new(),
            priority: Priority::Medium,
            status: status.to_string(),
            due: None,
            completed: false,
            position: 0,
            initial: true,
            saving: false,
        }
    }

    /// Read the current value of one field
    pub fn field_value(&self, field: Field) -> FieldValue {
        match field {
            Field::Name => FieldValue::Name(self.name.clone()),
            Field::Assignees => FieldValue::Assignees(self.assignees.clone()),
            Field::Priority => FieldValue::Priority(self.priority),
            Field::Status => FieldValue::Status(self.status.clone()),
            Field::Due => FieldValue::Due(self.due),
            Field::Completed => FieldValue::Completed(self.completed),
        }
    }
}

/// Editable task fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Assignees,
    Priority,
    Status,
    Due,
    Completed,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Name,
        Field::Assignees,
        Field::Priority,
        Field::Status,
        Field::Due,
        Field::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Assignees => "assignees",
            Field::Priority => "priority",
            Field::Status => "status",
            Field::Due => "due",
            Field::Completed => "completed",
        }
    }
}

/// A single field value, used when moving values between patches and tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(String),
    Assignees(BTreeSet<UserId>),
    Priority(Priority),
    Status(String),
    Due(Option<NaiveDate>),
    Completed(bool),
}

/// A partial set of task fields.
///
/// Used as the create bundle, as the body of an update, and as the inverse
/// patch retained while an update is in flight. `due: Some(None)` clears the
/// due date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<BTreeSet<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskFields {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Which fields this patch sets
    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        if self.name.is_some() {
            out.push(Field::Name);
        }
        if self.assignees.is_some() {
            out.push(Field::Assignees);
        }
        if self.priority.is_some() {
            out.push(Field::Priority);
        }
        if self.status.is_some() {
            out.push(Field::Status);
        }
        if self.due.is_some() {
            out.push(Field::Due);
        }
        if self.completed.is_some() {
            out.push(Field::Completed);
        }
        out
    }

    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => self.name.clone().map(FieldValue::Name),
            Field::Assignees => self.assignees.clone().map(FieldValue::Assignees),
            Field::Priority => self.priority.map(FieldValue::Priority),
            Field::Status => self.status.clone().map(FieldValue::Status),
            Field::Due => self.due.map(FieldValue::Due),
            Field::Completed => self.completed.map(FieldValue::Completed),
        }
    }

    pub fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::Name(v) => self.name = Some(v),
            FieldValue::Assignees(v) => self.assignees = Some(v),
            FieldValue::Priority(v) => self.priority = Some(v),
            FieldValue::Status(v) => self.status = Some(v),
            FieldValue::Due(v) => self.due = Some(v),
            FieldValue::Completed(v) => self.completed = Some(v),
        }
    }

    /// Merge `other` on top of `self` (fields in `other` win)
    pub fn merge(&mut self, other: &TaskFields) {
        for field in other.fields() {
            if let Some(v) = other.get(field) {
                self.set(v);
            }
        }
    }

    /// Keep only the listed fields
    pub fn retain(&self, keep: &[Field]) -> TaskFields {
        let mut out = TaskFields::default();
        for field in self.fields() {
            if keep.contains(&field)
                && let Some(v) = self.get(field)
            {
                out.set(v);
            }
        }
        out
    }

    /// True if applying this patch would leave `task` unchanged
    pub fn is_noop_for(&self, task: &Task) -> bool {
        self.fields()
            .into_iter()
            .all(|f| self.get(f).as_ref() == Some(&task.field_value(f)))
    }

    /// Apply to a task, returning the inverse patch (previous values of the
    /// fields that were set)
    pub fn apply_to(&self, task: &mut Task) -> TaskFields {
        let mut inverse = TaskFields::default();
        for field in self.fields() {
            inverse.set(task.field_value(field));
            if let Some(v) = self.get(field) {
                set_field(task, v);
            }
        }
        inverse
    }

    /// The full field bundle of a task (used for create requests)
    pub fn from_task(task: &Task) -> TaskFields {
        let mut out = TaskFields::default();
        for field in Field::ALL {
            out.set(task.field_value(field));
        }
        out
    }
}

/// Write one field value into a task
pub fn set_field(task: &mut Task, value: FieldValue) {
    match value {
        FieldValue::Name(v) => task.name = v,
        FieldValue::Assignees(v) => task.assignees = v,
        FieldValue::Priority(v) => task.priority = v,
        FieldValue::Status(v) => task.status = v,
        FieldValue::Due(v) => task.due = v,
        FieldValue::Completed(v) => task.completed = v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Task {
        let mut t = Task::temporary(TaskId::Server(7), "pending");
        t.name = "Write docs".into();
        t.initial = false;
        t
    }

    #[test]
    fn task_id_parses_and_displays() {
        assert_eq!("42".parse::<TaskId>().unwrap(), TaskId::Server(42));
        assert_eq!("tmp-3".parse::<TaskId>().unwrap(), TaskId::Temp(3));
        assert_eq!(TaskId::Temp(3).to_string(), "tmp-3");
        assert!("abc".parse::<TaskId>().is_err());
        assert_eq!(TaskId::Temp(1).server(), None);
    }

    #[test]
    fn server_ids_are_plain_numbers_on_the_wire() {
        assert_eq!(serde_json::to_string(&TaskId::Server(9)).unwrap(), "9");
        assert_eq!(serde_json::to_string(&TaskId::Temp(2)).unwrap(), r#""tmp-2""#);
        let parsed: Task = serde_json::from_str(
            r#"{"id":12,"name":"Ship","priority":"high","status":"pending"}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, TaskId::Server(12));
        assert!(!parsed.initial);
    }

    #[test]
    fn apply_returns_inverse() {
        let mut task = sample();
        let patch = TaskFields {
            priority: Some(Priority::High),
            due: Some(NaiveDate::from_ymd_opt(2025, 5, 1)),
            ..Default::default()
        };
        let inverse = patch.apply_to(&mut task);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due, NaiveDate::from_ymd_opt(2025, 5, 1));
        assert_eq!(
            inverse,
            TaskFields {
                priority: Some(Priority::Medium),
                due: Some(None),
                ..Default::default()
            }
        );
        inverse.apply_to(&mut task);
        assert_eq!(task, sample());
    }

    #[test]
    fn noop_detection() {
        let task = sample();
        let same = TaskFields {
            name: Some("Write docs".into()),
            ..Default::default()
        };
        let different = TaskFields {
            name: Some("Write more docs".into()),
            ..Default::default()
        };
        assert!(same.is_noop_for(&task));
        assert!(!different.is_noop_for(&task));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = TaskFields {
            status: Some("completed".into()),
            due: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"status":"completed","due":null}"#);
    }

    #[test]
    fn catalog_lookup_is_case_insensitive() {
        let catalog = StatusCatalog::default();
        assert_eq!(catalog.done_key(), "completed");
        assert_eq!(catalog.default_key(), "pending");
        assert!(catalog.is_done("Completed"));
        assert_eq!(catalog.get("IN_PROGRESS").map(|s| s.label.as_str()), Some("In Progress"));
    }
}
