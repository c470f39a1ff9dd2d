use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Like;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateLikeRequest {
    pub post_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/likes", get(list_likes).post(create_like))
        .route("/likes/{id}", axum::routing::delete(delete_like))
}

async fn create_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateLikeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    // Verify post exists
    let _: String = conn
        .query_row(
            "SELECT id FROM posts WHERE id = ?1",
            params![req.post_id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    // One like per (post, author); pre-check, same race caveat as usernames
    let already: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM likes WHERE post_id = ?1 AND author_id = ?2",
        params![req.post_id, user.id],
        |row| row.get(0),
    )?;
    if already {
        return Err(AppError::Conflict("Post already liked".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO likes (id, post_id, author_id) VALUES (?1, ?2, ?3)",
        params![id, req.post_id, user.id],
    )?;

    Ok(Json(json!({ "ok": true, "id": id })))
}

async fn list_likes(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Like>>> {
    let conn = state.db.get()?;
    let mut stmt = conn
        .prepare("SELECT id, post_id, author_id, created_at FROM likes ORDER BY created_at")?;
    let likes = stmt
        .query_map([], |row| {
            Ok(Like {
                id: row.get(0)?,
                post_id: row.get(1)?,
                author_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(Json(likes))
}

async fn delete_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let author_id: String = conn
        .query_row(
            "SELECT author_id FROM likes WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if author_id != user.id && !user.is_admin() {
        return Err(AppError::denied(state.config.auth.strict_forbidden));
    }

    conn.execute("DELETE FROM likes WHERE id = ?1", params![id])?;
    Ok(Json(json!({ "ok": true })))
}
