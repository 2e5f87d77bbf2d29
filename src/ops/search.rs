use std::ops::Range;

use regex::Regex;

use crate::model::{SectionId, TaskId, User};
use crate::store::Board;

/// Which field of a task matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchField {
    Id,
    Name,
    Status,
    Assignee,
}

/// A search hit for a task field
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub section: SectionId,
    pub task: TaskId,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
pub fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search the cached tasks of every section, or only `section` if given.
/// Assignee ids are resolved through `users` so names can match.
pub fn search_board(
    board: &Board,
    re: &Regex,
    section: Option<SectionId>,
    users: &[User],
) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for sec in board.sections() {
        if section.is_some_and(|s| s != sec.id) {
            continue;
        }
        for task in board.section_tasks(sec.id) {
            let mut push = |field: MatchField, text: &str| {
                let spans = find_matches(re, text);
                if !spans.is_empty() {
                    hits.push(SearchHit {
                        section: sec.id,
                        task: task.id,
                        field,
                        spans,
                    });
                }
            };
            push(MatchField::Id, &task.id.to_string());
            push(MatchField::Name, &task.name);
            push(MatchField::Status, &task.status);
            for user in users.iter().filter(|u| task.assignees.contains(&u.id)) {
                push(MatchField::Assignee, &user.name);
            }
        }
    }
    hits
}

/// Distinct tasks among the hits, in board order
pub fn hit_tasks(hits: &[SearchHit]) -> Vec<TaskId> {
    let mut out: Vec<TaskId> = Vec::new();
    for hit in hits {
        if !out.contains(&hit.task) {
            out.push(hit.task);
        }
    }
    out
}
