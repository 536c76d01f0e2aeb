//! In-memory repository for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use plotplay_core::state::GameState;

use super::{RepositoryError, StateRepository};

#[derive(Default)]
pub struct MemoryRepository {
    snapshots: Mutex<BTreeMap<String, GameState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateRepository for MemoryRepository {
    fn save(&self, session_id: &str, state: &GameState) -> Result<(), RepositoryError> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<GameState>, RepositoryError> {
        Ok(self.snapshots.lock().unwrap().get(session_id).cloned())
    }

    fn delete(&self, session_id: &str) -> Result<(), RepositoryError> {
        self.snapshots.lock().unwrap().remove(session_id);
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.snapshots.lock().unwrap().keys().cloned().collect())
    }
}
