use crate::models::{MessageRow, UserRow};
use crate::{Database, DbError};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            let inserted = conn.query_row(
                "INSERT INTO users (username, password) VALUES (?1, ?2)
                 RETURNING username, password, created_at",
                (username, password_hash),
                |row| {
                    Ok(UserRow {
                        username: row.get(0)?,
                        password: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            );

            match inserted {
                Ok(user) => Ok(user),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(DbError::UsernameTaken.into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Messages --

    pub fn insert_message(&self, author: &str, text: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO messages (author, text) VALUES (?1, ?2)
                 RETURNING id, author, text, created_at",
                (author, text),
                |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        author: row.get(1)?,
                        text: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    /// All messages in insertion order.
    pub fn get_messages(&self) -> Result<Vec<MessageRow>> {
        self.with_conn(query_messages)
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                created_at: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(conn: &Connection) -> Result<Vec<MessageRow>> {
    let mut stmt =
        conn.prepare("SELECT id, author, text, created_at FROM messages ORDER BY id ASC")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                author: row.get(1)?,
                text: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
