use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::config_io::ConfigError;
use crate::model::{FilterState, SectionId};

pub const STATE_FILE: &str = ".taskdeck-state.json";

/// Persisted board UI state (written to .taskdeck-state.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UiState {
    /// Project the state belongs to; state for another project is ignored
    #[serde(default)]
    pub project: u64,
    #[serde(default)]
    pub collapsed: Vec<SectionId>,
    #[serde(default)]
    pub filter: FilterState,
}

/// Read the state file from `dir`. Missing or malformed files yield None.
pub fn read_ui_state(dir: &Path) -> Option<UiState> {
    let path = dir.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable UI state");
            None
        }
    }
}

/// Write the state file to `dir`
pub fn write_ui_state(dir: &Path, state: &UiState) -> Result<(), ConfigError> {
    let path = dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    super::atomic_write(&path, content.as_bytes())
        .map_err(|e| ConfigError::Write { path, source: e })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut filter = FilterState {
            search: Some("docs".into()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        filter.toggle_status("completed");
        let state = UiState {
            project: 3,
            collapsed: vec![2, 5],
            filter,
        };
        write_ui_state(dir.path(), &state).unwrap();
        assert_eq!(read_ui_state(dir.path()), Some(state));
    }

    #[test]
    fn read_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn read_malformed_json_returns_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "not json {{{").unwrap();
        assert!(read_ui_state(dir.path()).is_none());
    }

    #[test]
    fn serde_defaults_on_minimal_object() {
        let state: UiState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, UiState::default());
    }
}
