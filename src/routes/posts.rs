use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

// --- Request / response shapes ---

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Serialize)]
pub struct PostOut {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
    pub likes: i64,
    pub comments: i64,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
}

// --- Handlers ---

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<PostOut>> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Post title cannot be empty".into()));
    }
    if req.body.trim().is_empty() {
        return Err(AppError::BadRequest("Post body cannot be empty".into()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (id, author_id, title, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, user.id, title, req.body],
    )?;

    let post = query_post(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

async fn list_posts(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<PostOut>>> {
    let conn = state.db.get()?;

    // Child counts ride along as correlated subqueries so listing stays a
    // single statement no matter how many posts come back.
    let mut stmt = conn.prepare(
        "SELECT p.id, p.author_id, p.title, p.body, p.created_at,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments
         FROM posts p
         ORDER BY p.created_at DESC",
    )?;
    let posts = stmt
        .query_map([], post_out_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<PostOut>> {
    let conn = state.db.get()?;
    let post = query_post(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let author_id: String = conn
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if author_id != user.id && !user.is_admin() {
        return Err(AppError::denied(state.config.auth.strict_forbidden));
    }

    db::cascade_delete_post(&mut conn, &id)?;
    Ok(Json(json!({ "ok": true })))
}

// --- Query helpers ---

fn query_post(conn: &rusqlite::Connection, id: &str) -> Result<Option<PostOut>, AppError> {
    let post = conn
        .query_row(
            "SELECT p.id, p.author_id, p.title, p.body, p.created_at,
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes,
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments
             FROM posts p
             WHERE p.id = ?1",
            params![id],
            post_out_from_row,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(post)
}

fn post_out_from_row(row: &rusqlite::Row<'_>) -> Result<PostOut, rusqlite::Error> {
    Ok(PostOut {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        likes: row.get(5)?,
        comments: row.get(6)?,
    })
}
