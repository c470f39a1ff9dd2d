use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{hash_password, verify_password};
use crate::db;
use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

// --- Request / response shapes ---

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub bio: String,
    pub age: i64,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserOut {
    pub id: String,
    pub username: String,
    pub bio: String,
    pub age: i64,
    pub role: Role,
    pub created_at: String,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/users", get(list_users).delete(delete_self))
        .route("/users/{id}", get(get_user))
}

// --- Handlers ---

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".into()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password cannot be empty".into()));
    }

    let conn = state.db.get()?;

    // Pre-check, not a constraint: two racing registrations can both pass
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    if taken {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hash = hash_password(&req.password)?;
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, username, password_hash, bio, age, role) \
         VALUES (?1, ?2, ?3, ?4, ?5, 'user')",
        params![id, username, hash, req.bio, req.age],
    )?;

    tracing::info!(%username, "registered new user");
    Ok(Json(json!({ "ok": true })))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let (id, hash, role): (String, String, String) = conn
        .query_row(
            "SELECT id, password_hash, role FROM users WHERE username = ?1",
            params![req.username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(|_| AppError::Unauthorized)?;

    if !verify_password(&req.password, &hash) {
        return Err(AppError::Unauthorized);
    }

    let token = state
        .jwt
        .issue(&id, Role::parse(&role), state.config.auth.token_hours)?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

async fn list_users(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<UserOut>>> {
    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, username, bio, age, role, created_at FROM users ORDER BY created_at",
    )?;
    let users = stmt
        .query_map([], user_out_from_row)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<UserOut>> {
    let conn = state.db.get()?;
    let user = conn
        .query_row(
            "SELECT id, username, bio, age, role, created_at FROM users WHERE id = ?1",
            params![id],
            user_out_from_row,
        )
        .map_err(|_| AppError::NotFound)?;
    Ok(Json(user))
}

/// Delete the calling user and everything they own.
async fn delete_self(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;
    db::cascade_delete_user(&mut conn, &user.id)?;
    tracing::info!(username = %user.username, "user deleted their account");
    Ok(Json(json!({ "ok": true })))
}

fn user_out_from_row(row: &rusqlite::Row<'_>) -> Result<UserOut, rusqlite::Error> {
    let role: String = row.get(4)?;
    Ok(UserOut {
        id: row.get(0)?,
        username: row.get(1)?,
        bio: row.get(2)?,
        age: row.get(3)?,
        role: Role::parse(&role),
        created_at: row.get(5)?,
    })
}
