use std::fs;
use std::path::Path;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use scholar_core::WorkspaceName;
use scholar_engine::write_atomically;
use serde::{Deserialize, Serialize};

pub const STATE_FILENAME: &str = ".scholar_state.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    last_workspace: Option<String>,
    saved_utc: Option<String>,
}

/// Workspace selected when the client last ran, if any was remembered.
pub fn load_last_workspace(state_dir: &Path) -> Option<WorkspaceName> {
    let path = state_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            engine_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return None;
        }
    };

    let state: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            engine_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            return None;
        }
    };

    let workspace = state
        .last_workspace
        .filter(|name| !name.is_empty())
        .map(WorkspaceName::new);
    if let Some(workspace) = &workspace {
        engine_info!("Restored last workspace {} from {:?}", workspace, path);
    }
    workspace
}

pub fn save_last_workspace(state_dir: &Path, workspace: Option<&WorkspaceName>) {
    let state = PersistedState {
        last_workspace: workspace.map(|name| name.as_str().to_string()),
        saved_utc: Some(Utc::now().to_rfc3339()),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&state, pretty) {
        Ok(text) => text,
        Err(err) => {
            engine_error!("Failed to serialize persisted state: {}", err);
            return;
        }
    };

    let path = state_dir.join(STATE_FILENAME);
    if let Err(err) = write_atomically(&path, content.as_bytes()) {
        engine_error!("Failed to write persisted state to {:?}: {}", path, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remembers_the_last_workspace() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_last_workspace(dir.path()), None);

        save_last_workspace(dir.path(), Some(&"20240101_paper".into()));
        assert_eq!(
            load_last_workspace(dir.path()),
            Some(WorkspaceName::new("20240101_paper"))
        );

        save_last_workspace(dir.path(), None);
        assert_eq!(load_last_workspace(dir.path()), None);
    }

    #[test]
    fn corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILENAME), "not ron at all (").unwrap();
        assert_eq!(load_last_workspace(dir.path()), None);
    }

    #[test]
    fn state_file_records_save_time() {
        let dir = tempfile::tempdir().unwrap();
        save_last_workspace(dir.path(), Some(&"ws".into()));
        let text = fs::read_to_string(dir.path().join(STATE_FILENAME)).unwrap();
        let state: PersistedState = ron::from_str(&text).unwrap();
        assert!(state.saved_utc.is_some());
    }
}
