use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use regex::Regex;

use crate::api::SharedRemote;
use crate::api::http::HttpRemote;
use crate::api::memory::MemoryRemote;
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::edit::validate_name;
use crate::io::config_io::{self, CONFIG_FILE, LoadedConfig};
use crate::io::logging::{self, LogTarget};
use crate::model::{
    Config, DeleteMode, FilterState, Priority, SectionId, StatusCatalog, Task, TaskFields, TaskId,
};
use crate::ops::search;
use crate::ops::task_ops::{completion_patch, status_patch};
use crate::session::{Level, Session};

type CliResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CliResult {
    let cwd = std::env::current_dir()?;
    let json = cli.json;
    let explicit = cli.config.as_deref();

    match cli.command {
        // Config edits work on the file itself, even one that no longer parses
        Some(Commands::Config(cmd)) => {
            logging::init_tracing(LogTarget::Stderr)?;
            cmd_config(cmd, explicit, &cwd)
        }
        None => {
            let loaded = config_io::load_config(explicit, &cwd)?;
            logging::init_tracing(LogTarget::file_in(&loaded.state_dir(&cwd)))?;
            let remote = connect(&loaded.config, cli.demo);
            crate::tui::run(loaded, remote, &cwd)
        }
        Some(cmd) => {
            let loaded = config_io::load_config(explicit, &cwd)?;
            logging::init_tracing(LogTarget::Stderr)?;
            let remote = connect(&loaded.config, cli.demo);
            let mut board = BoardClient::open(loaded, remote)?;
            run_command(&mut board, cmd, json)
        }
    }
}

fn run_command(board: &mut BoardClient, cmd: Commands, json: bool) -> CliResult {
    match cmd {
        // Read commands
        Commands::Sections => cmd_sections(board, json),
        Commands::Tasks(args) => cmd_tasks(board, args, json),
        Commands::Search(args) => cmd_search(board, args, json),
        Commands::Users => cmd_users(board, json),

        // Write commands
        Commands::Add(args) => cmd_add(board, args, json),
        Commands::Mv(args) => cmd_mv(board, args),
        Commands::Reorder(args) => cmd_reorder(board, args),
        Commands::Set(args) => cmd_set(board, args, json),
        Commands::Rm(args) => cmd_rm(board, args),
        Commands::Section(cmd) => cmd_section(board, cmd),

        // Handled before the board is opened
        Commands::Config(_) => Ok(()),
    }
}

/// The HTTP backend from config, or the seeded in-memory one for `--demo`
pub fn connect(config: &Config, demo: bool) -> SharedRemote {
    if demo {
        tracing::info!("using the in-memory demo backend");
        Box::new(MemoryRemote::demo(config.list.page_size))
    } else {
        Box::new(HttpRemote::from_config(&config.server))
    }
}

// ---------------------------------------------------------------------------
// Session plumbing
// ---------------------------------------------------------------------------

/// A session driven synchronously against a remote
pub struct BoardClient {
    session: Session,
    remote: SharedRemote,
}

impl BoardClient {
    /// Load every section and every page of its tasks
    pub fn open(loaded: LoadedConfig, remote: SharedRemote) -> Result<Self, Box<dyn std::error::Error>> {
        let mut board = BoardClient {
            session: Session::new(loaded.config),
            remote,
        };
        board.session.load_sections();
        board.session.load_users();
        board.settle()?;
        board.load_all()?;
        Ok(board)
    }

    fn load_all(&mut self) -> CliResult {
        for id in self.session.board().section_ids() {
            if self.session.board().section(id).is_some_and(|s| s.collapsed) {
                self.session.toggle_collapse(id)?;
                self.settle()?;
            }
            while self.session.load_more(id).is_some() {
                self.settle()?;
            }
        }
        Ok(())
    }

    /// Run queued requests to completion. Failures surface as notices;
    /// any warning or error becomes the command's error.
    fn settle(&mut self) -> CliResult {
        self.session.drive(&*self.remote, Instant::now());
        let failures: Vec<String> = self
            .session
            .notices()
            .iter()
            .filter(|n| n.level >= Level::Warning)
            .map(|n| n.message.clone())
            .collect();
        self.session.notices_mut().clear();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; ").into())
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Resolve a section by id or (case-insensitive) name
    fn section(&self, key: &str) -> Result<SectionId, String> {
        let board = self.session.board();
        if let Ok(id) = key.parse::<SectionId>()
            && board.section(id).is_some()
        {
            return Ok(id);
        }
        board
            .sections()
            .find(|s| s.name.eq_ignore_ascii_case(key.trim()))
            .map(|s| s.id)
            .ok_or_else(|| format!("section not found: {}", key))
    }

    fn task(&self, key: &str) -> Result<TaskId, String> {
        let id = match key.parse::<u64>() {
            Ok(n) => TaskId::Server(n),
            Err(_) => return Err(format!("invalid task id: {}", key)),
        };
        if self.session.board().contains_task(id) {
            Ok(id)
        } else {
            Err(format!("task not found: {}", key))
        }
    }

    fn record(&self, id: TaskId) -> Result<&Task, String> {
        self.session
            .board()
            .task(id)
            .ok_or_else(|| format!("task not found: {}", id))
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_sections(board: &mut BoardClient, json: bool) -> CliResult {
    let sections: Vec<_> = board.session.board().sections().collect();
    if json {
        let out: Vec<SectionJson> = sections.iter().map(|s| section_to_json(s)).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for section in sections {
            println!("{}", format_section_line(section));
        }
    }
    Ok(())
}

fn cmd_tasks(board: &mut BoardClient, args: TasksArgs, json: bool) -> CliResult {
    let section = board.section(&args.section)?;
    let mut filter = FilterState {
        search: args.search,
        assignee: args.assignee,
        priority: args.priority.as_deref().map(str::parse::<Priority>).transpose()?,
        ..Default::default()
    };
    if let Some(status) = args.status.as_deref() {
        filter.toggle_status(status);
    }
    if filter.is_active() {
        board.session.set_filter(filter);
        board.settle()?;
        while board.session.load_more(section).is_some() {
            board.settle()?;
        }
    }

    let session = board.session();
    let Some(sec) = session.board().section(section) else {
        return Err(format!("section not found: {}", section).into());
    };
    let tasks = session.board().section_tasks(section);
    if json {
        let out = TaskListJson {
            section,
            name: sec.name.clone(),
            tasks: tasks.iter().map(|t| task_to_json(t)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", format_section_header(sec));
        println!();
        let statuses = &session.config().statuses;
        for task in tasks {
            println!("{}", format_task_line(task, statuses, session.users()));
        }
    }
    Ok(())
}

fn cmd_search(board: &mut BoardClient, args: SearchArgs, json: bool) -> CliResult {
    let re = Regex::new(&args.pattern)?;
    let section = args.section.as_deref().map(|s| board.section(s)).transpose()?;
    let session = board.session();
    let hits = search::search_board(session.board(), &re, section, session.users());

    if json {
        let out: Vec<SearchHitJson> = hits
            .iter()
            .filter_map(|hit| {
                let task = session.board().task(hit.task)?;
                Some(hit_to_json(hit, &task.name))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let statuses = &session.config().statuses;
    for id in search::hit_tasks(&hits) {
        let Some(task) = session.board().task(id) else {
            continue;
        };
        let section = session
            .board()
            .owner(id)
            .and_then(|s| session.board().section(s))
            .map_or("?", |s| s.name.as_str());
        println!("[{}] {}", section, format_task_line(task, statuses, session.users()));
    }
    Ok(())
}

fn cmd_users(board: &mut BoardClient, json: bool) -> CliResult {
    let users = board.session().users();
    if json {
        println!("{}", serde_json::to_string_pretty(users)?);
    } else {
        for user in users {
            println!("{:>4}  {}", user.id, user.name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(board: &mut BoardClient, args: AddArgs, json: bool) -> CliResult {
    let section = board.section(&args.section)?;
    let max = board.session.config().autosave.max_name_len;
    validate_name(&args.name, max)?;

    let mut patch = TaskFields::default();
    if let Some(p) = args.priority.as_deref() {
        patch.priority = Some(p.parse()?);
    }
    if let Some(s) = args.status.as_deref() {
        patch.status = Some(status_key(&board.session.config().statuses, s)?);
    }
    if let Some(d) = args.due.as_deref() {
        patch.due = Some(parse_due(d)?);
    }
    if !args.assignees.is_empty() {
        patch.assignees = Some(args.assignees.into_iter().collect());
    }

    let now = Instant::now();
    let temp = board.session.add_task(section)?;
    board.session.paste(temp, &args.name, now);
    if patch.is_empty() {
        board.session.submit(temp, now)?;
    } else {
        board.session.update_fields(temp, patch)?;
    }
    board.settle()?;

    let id = board
        .session
        .selected()
        .filter(|id| !id.is_temp())
        .ok_or("task was not created")?;
    let task = board.record(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task))?);
    } else {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_mv(board: &mut BoardClient, args: MvArgs) -> CliResult {
    let task = board.task(&args.task)?;
    let section = board.section(&args.section)?;
    let len = board.session.board().section_tasks(section).len();
    let index = args.index.unwrap_or(len).min(len);
    board.session.move_task(task, section, index)?;
    board.settle()
}

fn cmd_reorder(board: &mut BoardClient, args: ReorderArgs) -> CliResult {
    let task = board.task(&args.task)?;
    let (section, from) = board
        .session
        .board()
        .locate(task)
        .ok_or_else(|| format!("task not found: {}", task))?;
    board.session.reorder_task(section, from, args.position)?;
    board.settle()
}

fn cmd_set(board: &mut BoardClient, args: SetArgs, json: bool) -> CliResult {
    let task = board.task(&args.task)?;
    let mut patch = TaskFields::default();
    for raw in &args.fields {
        let record = board.record(task)?;
        let statuses = &board.session.config().statuses;
        let next = parse_assignment(record, statuses, raw)?;
        if let Some(name) = next.name.as_deref() {
            validate_name(name, board.session.config().autosave.max_name_len)?;
        }
        patch.merge(&next);
    }
    board.session.update_fields(task, patch)?;
    board.settle()?;

    let record = board.record(task)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(record))?);
    }
    Ok(())
}

fn cmd_rm(board: &mut BoardClient, args: RmArgs) -> CliResult {
    let tasks = args
        .tasks
        .iter()
        .map(|t| board.task(t))
        .collect::<Result<Vec<_>, _>>()?;
    match tasks.as_slice() {
        [single] => {
            board.session.delete_task(*single)?;
        }
        many => {
            board.session.bulk_delete(many)?;
        }
    }
    board.settle()
}

fn cmd_section(board: &mut BoardClient, cmd: SectionCmd) -> CliResult {
    match cmd.action {
        SectionAction::Add { name } => {
            board.session.create_section(&name)?;
            board.settle()?;
            if let Some(created) = board.session.board().sections().last() {
                println!("{}", created.id);
            }
        }
        SectionAction::Rename { section, name } => {
            let id = board.section(&section)?;
            board.session.rename_section(id, &name)?;
            board.settle()?;
        }
        SectionAction::Mv { section, position } => {
            let id = board.section(&section)?;
            board.session.reorder_section(id, position)?;
            board.settle()?;
        }
        SectionAction::Rm {
            section,
            with_tasks,
        } => {
            let id = board.section(&section)?;
            let mode = if with_tasks {
                DeleteMode::WithTasks
            } else {
                DeleteMode::SectionOnly
            };
            board.session.delete_section(id, mode)?;
            board.settle()?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(cmd: ConfigCmd, explicit: Option<&Path>, cwd: &Path) -> CliResult {
    match cmd.action {
        ConfigAction::Set { key, value } => {
            let path = config_target(explicit, cwd);
            let mut doc = if path.is_file() {
                config_io::read_config(&path)?.1
            } else {
                toml_edit::DocumentMut::new()
            };
            config_io::set_value(&mut doc, &key, &value)?;
            config_io::write_config(&path, &doc)?;
            tracing::info!(path = %path.display(), %key, "config updated");
        }
        ConfigAction::Show => {
            let loaded = config_io::load_config(explicit, cwd)?;
            match &loaded.path {
                Some(p) => println!("# {}", p.display()),
                None => println!("# built-in defaults"),
            }
            print!("{}", toml::to_string_pretty(&loaded.config)?);
        }
    }
    Ok(())
}

/// The file `config set` edits: `--config`, the nearest taskdeck.toml, or a
/// new one in the working directory
fn config_target(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| config_io::discover(cwd))
        .unwrap_or_else(|| cwd.join(CONFIG_FILE))
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Parse one `field=value` assignment against the task's current state
pub fn parse_assignment(task: &Task, statuses: &StatusCatalog, raw: &str) -> Result<TaskFields, String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;
    let value = value.trim();
    let mut patch = TaskFields::default();
    match field.trim() {
        "name" => patch.name = Some(value.to_string()),
        "status" => {
            let key = status_key(statuses, value)?;
            patch = status_patch(task, &key, statuses);
        }
        "priority" => patch.priority = Some(value.parse()?),
        "due" => patch.due = Some(parse_due(value)?),
        "done" | "completed" => {
            let done = parse_bool(value)?;
            if done != task.completed {
                patch = completion_patch(task, statuses);
            }
        }
        "assignees" => {
            let ids = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u64>().map_err(|_| format!("invalid user id: {}", s)))
                .collect::<Result<_, _>>()?;
            patch.assignees = Some(ids);
        }
        other => {
            return Err(format!(
                "unknown field '{}' (expected: name, status, priority, due, done, assignees)",
                other
            ));
        }
    }
    Ok(patch)
}

fn status_key(statuses: &StatusCatalog, value: &str) -> Result<String, String> {
    statuses.get(value).map(|s| s.key.clone()).ok_or_else(|| {
        let keys: Vec<&str> = statuses.statuses.iter().map(|s| s.key.as_str()).collect();
        format!("unknown status '{}' (expected: {})", value, keys.join(", "))
    })
}

/// `YYYY-MM-DD`, or `none` to clear
fn parse_due(value: &str) -> Result<Option<NaiveDate>, String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD or none)", value))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected true or false, got '{}'", value)),
    }
}
