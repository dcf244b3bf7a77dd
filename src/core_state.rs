//! Shared application state handed to every HTTP handler.
//!
//! Holds no connection: each pipeline call opens its own SQLite connection on
//! the blocking pool, so `CoreState` is immutable after startup and shared
//! through an `Arc` without locking.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;

use crate::db;
use crate::pipeline::{Collaborators, Deadline};

pub struct CoreState {
    db_path: PathBuf,
    collaborators: Collaborators,
    /// Overall time budget of one pipeline call.
    pipeline_budget: Duration,
}

impl CoreState {
    pub fn new(db_path: PathBuf, collaborators: Collaborators, pipeline_budget: Duration) -> Self {
        Self {
            db_path,
            collaborators,
            pipeline_budget,
        }
    }

    /// Open a database connection. Migrations are applied on open.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// A fresh deadline for one pipeline call.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.pipeline_budget)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
