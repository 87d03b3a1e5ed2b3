//! The notes collection served to sync clients.
//!
//! Notes live in memory, ordered by identifier, so paging is stable for as
//! long as the collection does not change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// A note as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One page of notes.
#[derive(Debug, Clone, PartialEq)]
pub struct NotePage {
    /// Total notes in the collection
    pub total: usize,
    pub notes: Vec<Note>,
    /// Whether notes remain after this page
    pub has_more: bool,
}

/// In-memory notes collection.
#[derive(Debug)]
pub struct NoteFeed {
    notes: RwLock<BTreeMap<i64, Note>>,
    next_id: AtomicI64,
}

impl Default for NoteFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteFeed {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Create `count` sample notes.
    pub async fn seed(&self, count: usize) {
        for n in 1..=count {
            self.create(Some(format!("Note {}", n)), Some(format!("Sample note #{}", n)))
                .await;
        }
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }

    pub async fn get(&self, id: i64) -> Option<Note> {
        self.notes.read().await.get(&id).cloned()
    }

    /// Notes on 1-based `page` when split into pages of `limit`.
    pub async fn page(&self, page: usize, limit: usize) -> NotePage {
        let notes = self.notes.read().await;
        let skip = page.saturating_sub(1).saturating_mul(limit);
        let slice: Vec<Note> = notes.values().skip(skip).take(limit).cloned().collect();

        NotePage {
            total: notes.len(),
            has_more: skip.saturating_add(slice.len()) < notes.len(),
            notes: slice,
        }
    }

    pub async fn create(&self, title: Option<String>, body: Option<String>) -> Note {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let note = Note {
            id,
            title,
            body,
            updated_at: Utc::now(),
        };
        self.notes.write().await.insert(id, note.clone());
        tracing::debug!(id, "note created");
        note
    }

    /// Replace the title and body of an existing note.
    pub async fn update(
        &self,
        id: i64,
        title: Option<String>,
        body: Option<String>,
    ) -> Option<Note> {
        let mut notes = self.notes.write().await;
        let note = notes.get_mut(&id)?;
        note.title = title;
        note.body = body;
        note.updated_at = Utc::now();
        tracing::debug!(id, "note updated");
        Some(note.clone())
    }

    /// Returns whether the note existed.
    pub async fn delete(&self, id: i64) -> bool {
        let removed = self.notes.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(id, "note deleted");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pages_in_identifier_order() {
        let feed = NoteFeed::new();
        feed.seed(5).await;

        let first = feed.page(1, 2).await;
        assert_eq!(first.total, 5);
        assert!(first.has_more);
        assert_eq!(
            first.notes.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let last = feed.page(3, 2).await;
        assert!(!last.has_more);
        assert_eq!(last.notes.len(), 1);
        assert_eq!(last.notes[0].id, 5);

        let beyond = feed.page(9, 2).await;
        assert!(beyond.notes.is_empty());
        assert!(!beyond.has_more);
    }

    #[tokio::test]
    async fn mutations() {
        let feed = NoteFeed::new();
        let note = feed.create(Some("t".into()), Some("b".into())).await;
        assert_eq!(note.id, 1);

        let updated = feed.update(1, Some("t".into()), None).await.unwrap();
        assert_eq!(updated.body, None);
        assert!(updated.updated_at >= note.updated_at);
        assert!(feed.update(42, None, None).await.is_none());

        assert!(feed.delete(1).await);
        assert!(!feed.delete(1).await);
        assert!(feed.is_empty().await);

        // Identifiers are never reused
        assert_eq!(feed.create(None, None).await.id, 2);
    }
}
