//! Session snapshot persistence.
//!
//! The state is a pure serializable snapshot; the interface is the
//! minimal `save`/`load` pair plus listing for resume pickers. The file
//! backend writes one JSON document per session; the memory backend
//! serves tests.

mod file;
mod memory;

pub use file::FileRepository;
pub use memory::MemoryRepository;

use thiserror::Error;

use plotplay_core::state::GameState;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

pub trait StateRepository: Send + Sync {
    fn save(&self, session_id: &str, state: &GameState) -> Result<(), RepositoryError>;

    fn load(&self, session_id: &str) -> Result<Option<GameState>, RepositoryError>;

    fn delete(&self, session_id: &str) -> Result<(), RepositoryError>;

    fn list_sessions(&self) -> Result<Vec<String>, RepositoryError>;
}

/// A repository that drops everything; for sessions that opt out of
/// persistence.
#[derive(Debug, Default)]
pub struct NullRepository;

impl StateRepository for NullRepository {
    fn save(&self, _session_id: &str, _state: &GameState) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn load(&self, _session_id: &str) -> Result<Option<GameState>, RepositoryError> {
        Ok(None)
    }

    fn delete(&self, _session_id: &str) -> Result<(), RepositoryError> {
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(Vec::new())
    }
}
