//! File-backed snapshots: one JSON document per session.

use std::fs;
use std::path::PathBuf;

use plotplay_core::state::GameState;

use super::{RepositoryError, StateRepository};

pub struct FileRepository {
    base_dir: PathBuf,
}

impl FileRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        // Session ids are generated by us, but sanitize anyway so a
        // hostile id cannot escape the base directory.
        let safe: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

impl StateRepository for FileRepository {
    fn save(&self, session_id: &str, state: &GameState) -> Result<(), RepositoryError> {
        let path = self.path_for(session_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<GameState>, RepositoryError> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        let path = self.path_for(session_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, RepositoryError> {
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                sessions.push(stem.to_string());
            }
        }
        sessions.sort();
        Ok(sessions)
    }
}
