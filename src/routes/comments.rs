use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Comment;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: String,
    pub title: String,
}

#[derive(Deserialize, Default)]
pub struct ListCommentsParams {
    pub post_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/{id}", axum::routing::delete(delete_comment))
}

async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }

    let conn = state.db.get()?;

    // Verify post exists
    let _: String = conn
        .query_row(
            "SELECT id FROM posts WHERE id = ?1",
            params![req.post_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, author_id, title) VALUES (?1, ?2, ?3, ?4)",
        params![id, req.post_id, user.id, title],
    )?;

    Ok(Json(json!({ "ok": true, "id": id })))
}

async fn list_comments(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<ListCommentsParams>,
) -> AppResult<Json<Vec<Comment>>> {
    let conn = state.db.get()?;

    let map_row = |row: &rusqlite::Row<'_>| -> Result<Comment, rusqlite::Error> {
        Ok(Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            author_id: row.get(2)?,
            title: row.get(3)?,
            created_at: row.get(4)?,
        })
    };

    let comments = match params.post_id {
        Some(post_id) => {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, title, created_at FROM comments \
                 WHERE post_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt.query_map(params![post_id], map_row)?;
            rows.filter_map(|r| r.ok()).collect()
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, post_id, author_id, title, created_at FROM comments \
                 ORDER BY created_at",
            )?;
            let rows = stmt.query_map([], map_row)?;
            rows.filter_map(|r| r.ok()).collect()
        }
    };

    Ok(Json(comments))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let author_id: String = conn
        .query_row(
            "SELECT author_id FROM comments WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if author_id != user.id && !user.is_admin() {
        return Err(AppError::denied(state.config.auth.strict_forbidden));
    }

    conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    Ok(Json(json!({ "ok": true })))
}
