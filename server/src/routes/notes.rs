//! Notes collection routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::feed::Note;
use crate::handlers::{
    handle_create, handle_delete, handle_list, handle_update, ListQuery, ListResponse, NoteInput,
    NOTES_PATH,
};
use crate::AppState;

/// Create notes routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(NOTES_PATH, get(list_handler).post(create_handler))
        .route(
            &format!("{}/{{id}}", NOTES_PATH),
            put(update_handler).delete(delete_handler),
        )
}

/// GET /api/notes - One page of notes.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    let response = handle_list(&state.feed, query, state.config.page_size).await?;
    Ok(Json(response))
}

/// POST /api/notes - Create a note.
async fn create_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(input): Json<NoteInput>,
) -> (StatusCode, Json<Note>) {
    let note = handle_create(&state.feed, input).await;
    (StatusCode::CREATED, Json(note))
}

/// PUT /api/notes/{id} - Replace a note.
async fn update_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(input): Json<NoteInput>,
) -> Result<Json<Note>> {
    let note = handle_update(&state.feed, id, input).await?;
    Ok(Json(note))
}

/// DELETE /api/notes/{id} - Delete a note.
async fn delete_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    handle_delete(&state.feed, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
