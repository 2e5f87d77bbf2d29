use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - a section/task board for the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use this config file instead of searching for taskdeck.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Run against an in-memory board seeded with sample data
    #[arg(long, global = true)]
    pub demo: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List sections
    Sections,
    /// List the tasks of a section
    Tasks(TasksArgs),
    /// Search loaded tasks by regex
    Search(SearchArgs),
    /// List the assignee directory
    Users,
    /// Add a task to the end of a section
    Add(AddArgs),
    /// Move a task to another section
    Mv(MvArgs),
    /// Move a task to a new position within its section
    Reorder(ReorderArgs),
    /// Set task fields (name=, status=, priority=, due=, done=, assignees=)
    Set(SetArgs),
    /// Delete tasks
    Rm(RmArgs),
    /// Section management
    Section(SectionCmd),
    /// Edit taskdeck.toml
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TasksArgs {
    /// Section id or name
    pub section: String,
    /// Only tasks with this status key
    #[arg(long)]
    pub status: Option<String>,
    /// Only tasks with this priority
    #[arg(long)]
    pub priority: Option<String>,
    /// Only tasks assigned to this user id
    #[arg(long)]
    pub assignee: Option<u64>,
    /// Server-side text search
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
    /// Limit search to one section (id or name)
    #[arg(long)]
    pub section: Option<String>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Section id or name
    pub section: String,
    /// Task name
    pub name: String,
    /// Priority (low, medium, high)
    #[arg(long)]
    pub priority: Option<String>,
    /// Status key
    #[arg(long)]
    pub status: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Assignee user id (repeatable)
    #[arg(long = "assignee")]
    pub assignees: Vec<u64>,
}

#[derive(Args)]
pub struct MvArgs {
    /// Task id
    pub task: String,
    /// Destination section id or name
    pub section: String,
    /// Position in the destination (default: end)
    #[arg(long)]
    pub index: Option<usize>,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Task id
    pub task: String,
    /// New 0-based position within the section
    pub position: usize,
}

#[derive(Args)]
pub struct SetArgs {
    /// Task id
    pub task: String,
    /// Field assignments, e.g. status=done priority=high due=2025-03-01
    #[arg(required = true)]
    pub fields: Vec<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Task ids
    #[arg(required = true)]
    pub tasks: Vec<String>,
}

// ---------------------------------------------------------------------------
// Section management
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SectionCmd {
    #[command(subcommand)]
    pub action: SectionAction,
}

#[derive(Subcommand)]
pub enum SectionAction {
    /// Create a section at the end of the board
    Add {
        /// Section name
        name: String,
    },
    /// Rename a section
    Rename {
        /// Section id or name
        section: String,
        /// New name
        name: String,
    },
    /// Move a section to a new position
    Mv {
        /// Section id or name
        section: String,
        /// New 0-based position
        position: usize,
    },
    /// Delete a section; its tasks move to the first remaining section
    Rm {
        /// Section id or name
        section: String,
        /// Delete the section's tasks too
        #[arg(long)]
        with_tasks: bool,
    },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a config value (e.g. `td config set autosave.debounce_ms 500`)
    Set {
        /// Dotted key: table.field
        key: String,
        /// New value
        value: String,
    },
    /// Print the effective config
    Show,
}
