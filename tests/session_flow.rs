//! End-to-end flows through the public API: a host loop drives a
//! `Session` against the in-memory backend with simulated time.

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use taskdeck::api::memory::MemoryRemote;
use taskdeck::api::{self, Request};
use taskdeck::io::config_io::{CONFIG_FILE, load_config};
use taskdeck::io::state::{UiState, read_ui_state, write_ui_state};
use taskdeck::model::{Config, FilterState, Priority, SectionId, TaskId};
use taskdeck::paging::Line;
use taskdeck::session::{Level, Session};

fn open(config: Config, remote: &MemoryRemote, now: Instant) -> Session {
    let mut session = Session::new(config);
    session.load_sections();
    session.load_users();
    session.drive(remote, now);
    session
}

fn section_named(session: &Session, name: &str) -> SectionId {
    session
        .board()
        .sections()
        .find(|s| s.name == name)
        .map(|s| s.id)
        .unwrap()
}

fn first_task(session: &Session, section: SectionId) -> TaskId {
    session.board().section(section).unwrap().tasks[0]
}

#[test]
fn typed_name_is_created_after_the_quiet_period() {
    let remote = MemoryRemote::demo(25);
    let start = Instant::now();
    let mut session = open(Config::default(), &remote, start);
    let todo = section_named(&session, "To Do");

    let temp = session.add_task(todo).unwrap();
    for c in "Groceries".chars() {
        session.input_char(temp, c, start);
    }
    let deadline = session.next_deadline().unwrap();
    assert_eq!(deadline, start + Duration::from_millis(800));

    // Still typing: nothing leaves the client
    session.tick(start + Duration::from_millis(500));
    assert!(session.drain_outbox().is_empty());

    session.tick(deadline);
    let batch = session.drain_outbox();
    assert_eq!(batch.len(), 1);
    match &batch[0].request {
        Request::CreateTask { section, fields } => {
            assert_eq!(*section, todo);
            assert_eq!(fields.name.as_deref(), Some("Groceries"));
        }
        other => panic!("unexpected request {:?}", other),
    }
    for out in batch {
        let result = api::execute(&remote, &out.request);
        session.complete(out.id, result, deadline);
    }

    let created = *session.board().section(todo).unwrap().tasks.last().unwrap();
    assert!(!created.is_temp());
    let stored = remote.task(created.server().unwrap()).unwrap();
    assert_eq!(stored.name, "Groceries");
    assert_eq!(session.display_name(created), Some("Groceries"));
}

#[test]
fn rejected_update_rolls_back_and_notifies() {
    let remote = MemoryRemote::demo(25);
    let now = Instant::now();
    let mut session = open(Config::default(), &remote, now);
    let todo = section_named(&session, "To Do");
    let task = first_task(&session, todo);

    remote.fail_on("update_task");
    session.set_priority(task, Priority::Low).unwrap();
    assert_eq!(session.board().task(task).unwrap().priority, Priority::Low);
    session.drive(&remote, now);

    assert_eq!(session.board().task(task).unwrap().priority, Priority::High);
    assert_eq!(session.notices().current().map(|n| n.level), Some(Level::Error));
    assert!(!session.is_saving(task));

    remote.clear_failures();
    session.set_priority(task, Priority::Low).unwrap();
    session.drive(&remote, now);
    assert_eq!(session.board().task(task).unwrap().priority, Priority::Low);
    assert_eq!(
        remote.task(task.server().unwrap()).unwrap().priority,
        Priority::Low
    );
}

#[test]
fn scrolling_to_the_bottom_fetches_the_next_page() {
    let remote = MemoryRemote::demo(25);
    let now = Instant::now();
    let mut session = open(Config::default(), &remote, now);
    let backlog = section_named(&session, "Backlog");
    assert_eq!(session.board().section(backlog).unwrap().tasks.len(), 25);

    session.set_viewport(10);
    session.scroll_by(100, now);
    assert!(session.next_deadline().is_some());
    session.tick(now + Duration::from_millis(50));
    assert!(session.drain_outbox().is_empty());

    session.tick(now + Duration::from_millis(400));
    session.drive(&remote, now);
    let section = session.board().section(backlog).unwrap();
    assert_eq!(section.tasks.len(), 45);
    assert!(!section.page.has_more());
    assert!(!session.lines().contains(&Line::More(backlog)));
}

#[test]
fn filter_refetches_matching_tasks_only() {
    let remote = MemoryRemote::demo(25);
    let now = Instant::now();
    let mut session = open(Config::default(), &remote, now);
    let backlog = section_named(&session, "Backlog");

    let filter = FilterState {
        priority: Some(Priority::High),
        ..Default::default()
    };
    session.set_filter(filter);
    session.drive(&remote, now);

    let names: Vec<String> = session
        .tasks_in(backlog)
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names.len(), 6);
    assert!(names.iter().all(|n| n.starts_with("Backlog item")));
    assert!(
        session
            .board()
            .sections()
            .flat_map(|s| session.tasks_in(s.id))
            .all(|t| t.priority == Priority::High)
    );
}

#[test]
fn config_file_and_ui_state_shape_the_board() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join(CONFIG_FILE),
        "[list]\nwindow_rows = 5\nvirtualize_threshold = 10\n",
    )
    .unwrap();
    let loaded = load_config(None, tmp.path()).unwrap();
    let state_dir = loaded.state_dir(tmp.path());

    let remote = MemoryRemote::demo(25);
    let now = Instant::now();
    let mut session = open(loaded.config.clone(), &remote, now);
    let todo = section_named(&session, "To Do");
    let backlog = section_named(&session, "Backlog");

    let backlog_rows = session
        .lines()
        .iter()
        .filter(|l| matches!(l, Line::Task(t) if session.board().owner(*t) == Some(backlog)))
        .count();
    assert_eq!(backlog_rows, 5);

    session.toggle_collapse(todo).unwrap();
    write_ui_state(
        &state_dir,
        &UiState {
            project: session.config().server.project,
            collapsed: session.collapsed_sections(),
            filter: session.filter().clone(),
        },
    )
    .unwrap();

    // A new run restores the collapsed section before the first fetch
    let state = read_ui_state(&state_dir).unwrap();
    let mut next = Session::new(loaded.config);
    next.restore_collapsed(state.collapsed);
    next.load_sections();
    next.drive(&remote, now);
    assert!(next.board().section(todo).unwrap().collapsed);
    assert!(next.board().section(todo).unwrap().tasks.is_empty());
    assert_eq!(next.lines().first(), Some(&Line::Header(todo)));
    assert_eq!(next.lines().get(1), Some(&Line::Header(section_named(&next, "In Progress"))));
}
