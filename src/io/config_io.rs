use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Config;

pub const CONFIG_FILE: &str = "taskdeck.toml";

/// Error type for config and state file I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config document: {0}")]
    Document(#[from] toml_edit::TomlError),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("invalid state file: {0}")]
    State(#[from] serde_json::Error),
}

/// Where the config came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// None when running on built-in defaults
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Directory holding the config (or the working directory for
    /// defaults); the state and log files live here
    pub fn state_dir(&self, cwd: &Path) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf)
    }
}

/// Walk up from `start` looking for taskdeck.toml
pub fn discover(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Load the config named by `--config`, or the nearest one above `cwd`.
/// With neither, the built-in defaults apply.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig, ConfigError> {
    let path = match explicit {
        Some(p) if !p.is_file() => return Err(ConfigError::NotFound(p.to_path_buf())),
        Some(p) => Some(p.to_path_buf()),
        None => discover(cwd),
    };
    let Some(path) = path else {
        tracing::debug!("no {} found; using defaults", CONFIG_FILE);
        return Ok(LoadedConfig {
            config: Config::default(),
            path: None,
        });
    };
    let (config, _) = read_config(&path)?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(LoadedConfig {
        config,
        path: Some(path),
    })
}

/// Read the config, returning both the parsed config and the raw
/// toml_edit Document for round-trip-safe editing.
pub fn read_config(path: &Path) -> Result<(Config, toml_edit::DocumentMut), ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: Config = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    super::atomic_write(path, doc.to_string().as_bytes()).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    Integer,
}

/// Keys `td config set` accepts
const KEYS: &[(&str, Kind)] = &[
    ("server.base_url", Kind::Text),
    ("server.project", Kind::Integer),
    ("server.token_env", Kind::Text),
    ("server.timeout_secs", Kind::Integer),
    ("autosave.debounce_ms", Kind::Integer),
    ("autosave.max_name_len", Kind::Integer),
    ("list.virtualize_threshold", Kind::Integer),
    ("list.window_rows", Kind::Integer),
    ("list.page_size", Kind::Integer),
    ("list.scroll_debounce_ms", Kind::Integer),
    ("list.notice_ttl_secs", Kind::Integer),
];

/// Set a dotted `table.key` in the document. The result must still parse
/// as a config.
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, raw: &str) -> Result<(), ConfigError> {
    let kind = KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    let Some((table, field)) = key.split_once('.') else {
        return Err(ConfigError::UnknownKey(key.to_string()));
    };
    let value = match kind {
        Kind::Text => toml_edit::value(raw),
        Kind::Integer => {
            let n: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a whole number, got {:?}", raw),
            })?;
            if n < 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must not be negative".into(),
                });
            }
            toml_edit::value(n)
        }
    };
    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[table][field] = value;
    toml::from_str::<Config>(&doc.to_string())?;
    Ok(())
}
