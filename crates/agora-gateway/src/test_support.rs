use std::sync::Mutex;

use anyhow::{Result, anyhow};
use axum::extract::ws::Message;
use tokio::sync::mpsc;

use agora_db::Repository;
use agora_db::models::{MessageRow, UserRow};

use crate::connection::FrameSink;

/// Sink that forwards every frame into a channel the test can inspect.
pub fn channel_sink() -> (FrameSink, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = futures_util::sink::unfold(tx, |tx, frame: Message| async move {
        tx.send(frame).map_err(axum::Error::new)?;
        Ok::<_, axum::Error>(tx)
    });
    (Box::pin(sink), rx)
}

/// Sink whose every write fails.
pub fn broken_sink() -> FrameSink {
    let sink = futures_util::sink::unfold((), |(), _frame: Message| async {
        Err::<(), _>(axum::Error::new(std::io::Error::other("connection reset")))
    });
    Box::pin(sink)
}

/// Sink that accepts a frame and then never finishes writing it.
pub fn stalled_sink() -> FrameSink {
    let sink = futures_util::sink::unfold((), |(), _frame: Message| {
        futures_util::future::pending::<Result<(), axum::Error>>()
    });
    Box::pin(sink)
}

pub fn text_of(frame: Message) -> String {
    match frame {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// In-memory message store. With `failing`, every call errors.
#[derive(Default)]
pub struct MemoryRepository {
    messages: Mutex<Vec<MessageRow>>,
    failing: bool,
}

impl MemoryRepository {
    pub fn with_messages(messages: &[(&str, &str)]) -> Self {
        let repo = Self::default();
        for (author, text) in messages {
            repo.add_message(author, text).unwrap();
        }
        repo
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::default(),
            failing: true,
        }
    }

    pub fn stored(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| (m.author.clone(), m.text.clone()))
            .collect()
    }
}

impl Repository for MemoryRepository {
    fn add_message(&self, author: &str, text: &str) -> Result<MessageRow> {
        if self.failing {
            return Err(anyhow!("database is down"));
        }
        let mut messages = self.messages.lock().unwrap();
        let row = MessageRow {
            id: messages.len() as i64 + 1,
            author: author.to_string(),
            text: text.to_string(),
            created_at: String::new(),
        };
        messages.push(row.clone());
        Ok(row)
    }

    fn list_messages(&self) -> Result<Vec<MessageRow>> {
        if self.failing {
            return Err(anyhow!("database is down"));
        }
        Ok(self.messages.lock().unwrap().clone())
    }

    fn add_user(&self, _username: &str, _password_hash: &str) -> Result<UserRow> {
        Err(anyhow!("not supported"))
    }

    fn get_user(&self, _username: &str) -> Result<Option<UserRow>> {
        Ok(None)
    }
}
