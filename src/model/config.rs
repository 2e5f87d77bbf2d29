use serde::{Deserialize, Serialize};

use super::task::StatusCatalog;

/// Configuration from taskdeck.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub statuses: StatusCatalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the REST API, e.g. `https://tasks.example.com/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Project whose sections are shown
    #[serde(default = "default_project")]
    pub project: u64,
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: default_base_url(),
            project: default_project(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Idle time before a text edit on a persisted task is saved
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        AutosaveConfig {
            debounce_ms: default_debounce_ms(),
            max_name_len: default_max_name_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    /// Sections with at least this many tasks render through a window
    #[serde(default = "default_virtualize_threshold")]
    pub virtualize_threshold: usize,
    /// Rows shown by a windowed section's own scroll region
    #[serde(default = "default_window_rows")]
    pub window_rows: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Quiet period before the shared scroll container loads the next page
    #[serde(default = "default_scroll_debounce_ms")]
    pub scroll_debounce_ms: u64,
    /// How long a notification stays on screen
    #[serde(default = "default_notice_ttl_secs")]
    pub notice_ttl_secs: u64,
}

impl Default for ListConfig {
    fn default() -> Self {
        ListConfig {
            virtualize_threshold: default_virtualize_threshold(),
            window_rows: default_window_rows(),
            page_size: default_page_size(),
            scroll_debounce_ms: default_scroll_debounce_ms(),
            notice_ttl_secs: default_notice_ttl_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_project() -> u64 {
    1
}

fn default_token_env() -> String {
    "TASKDECK_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_debounce_ms() -> u64 {
    800
}

fn default_max_name_len() -> usize {
    200
}

fn default_virtualize_threshold() -> usize {
    20
}

fn default_window_rows() -> usize {
    10
}

fn default_page_size() -> u32 {
    25
}

fn default_scroll_debounce_ms() -> u64 {
    300
}

fn default_notice_ttl_secs() -> u64 {
    4
}
