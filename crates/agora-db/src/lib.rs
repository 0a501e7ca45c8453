pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use crate::models::{MessageRow, UserRow};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("username already exists")]
    UsernameTaken,
}

/// Persistence operations the chat core depends on. All calls are blocking;
/// async callers run them on `spawn_blocking`.
pub trait Repository: Send + Sync {
    fn add_message(&self, author: &str, text: &str) -> Result<MessageRow>;
    fn list_messages(&self) -> Result<Vec<MessageRow>>;
    fn add_user(&self, username: &str, password_hash: &str) -> Result<UserRow>;
    fn get_user(&self, username: &str) -> Result<Option<UserRow>>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

impl Repository for Database {
    fn add_message(&self, author: &str, text: &str) -> Result<MessageRow> {
        self.insert_message(author, text)
    }

    fn list_messages(&self) -> Result<Vec<MessageRow>> {
        self.get_messages()
    }

    fn add_user(&self, username: &str, password_hash: &str) -> Result<UserRow> {
        self.create_user(username, password_hash)
    }

    fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.get_user_by_username(username)
    }
}
