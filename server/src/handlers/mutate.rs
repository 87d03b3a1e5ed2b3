//! Mutation handlers - create, replace and delete notes.

use crate::error::{AppError, Result};
use crate::feed::{Note, NoteFeed};
use serde::Deserialize;

/// Request body for creating or replacing a note.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

pub async fn handle_create(feed: &NoteFeed, input: NoteInput) -> Note {
    feed.create(input.title, input.body).await
}

pub async fn handle_update(feed: &NoteFeed, id: i64, input: NoteInput) -> Result<Note> {
    feed.update(id, input.title, input.body)
        .await
        .ok_or_else(|| AppError::NotFound(format!("note {}", id)))
}

pub async fn handle_delete(feed: &NoteFeed, id: i64) -> Result<()> {
    if feed.delete(id).await {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("note {}", id)))
    }
}
