//! List handler - serves the collection one page at a time.

use crate::config::MAX_PAGE_SIZE;
use crate::error::{AppError, Result};
use crate::feed::{Note, NoteFeed};
use serde::{Deserialize, Serialize};

/// Query parameters for listing notes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 1-based page number
    pub page: Option<usize>,
    /// Notes per page
    pub limit: Option<usize>,
}

/// One page of the collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Total notes in the collection
    pub count: usize,
    /// Link to the following page, relative to the server root
    pub next: Option<String>,
    pub results: Vec<Note>,
}

/// Path the notes collection is served under.
pub const NOTES_PATH: &str = "/api/notes";

/// Serve one page of notes.
pub async fn handle_list(
    feed: &NoteFeed,
    query: ListQuery,
    default_limit: usize,
) -> Result<ListResponse> {
    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(AppError::BadRequest("page numbers start at 1".to_string()));
    }
    let limit = query
        .limit
        .map(|l| l.clamp(1, MAX_PAGE_SIZE))
        .unwrap_or(default_limit);

    let result = feed.page(page, limit).await;
    let next = result
        .has_more
        .then(|| format!("{}?page={}&limit={}", NOTES_PATH, page + 1, limit));

    tracing::debug!(page, limit, returned = result.notes.len(), "listing notes");

    Ok(ListResponse {
        count: result.total,
        next,
        results: result.notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn links_to_next_page() {
        let feed = NoteFeed::new();
        feed.seed(3).await;

        let query = ListQuery {
            page: None,
            limit: Some(2),
        };
        let response = handle_list(&feed, query, 50).await.unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.next.as_deref(), Some("/api/notes?page=2&limit=2"));

        let query = ListQuery {
            page: Some(2),
            limit: Some(2),
        };
        let response = handle_list(&feed, query, 50).await.unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.next, None);
    }

    #[tokio::test]
    async fn default_and_clamped_limits() {
        let feed = NoteFeed::new();
        feed.seed(4).await;

        let response = handle_list(&feed, ListQuery::default(), 3).await.unwrap();
        assert_eq!(response.results.len(), 3);

        let query = ListQuery {
            page: Some(1),
            limit: Some(0),
        };
        let response = handle_list(&feed, query, 3).await.unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let feed = NoteFeed::new();
        let query = ListQuery {
            page: Some(0),
            limit: None,
        };
        assert!(matches!(
            handle_list(&feed, query, 50).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
