use axum::extract::{Path, State};
use axum::http::header;
use axum::http::HeaderMap;
use axum::routing::{delete, post};
use axum::{Json, Router};
use rusqlite::params;
use serde_json::json;

use crate::db;
use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/drop_and_create_database", post(drop_and_create))
        .route("/admin/delete_comment/{id}", delete(delete_comment))
        .route("/admin/delete_like/{id}", delete(delete_like))
        .route("/admin/delete_user/{id}", delete(delete_user))
}

/// Drop and recreate the whole schema. Runs without credentials while the
/// store has never been initialized; afterwards it demands the admin role,
/// read from the users row rather than the token claim.
async fn drop_and_create(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<serde_json::Value>> {
    let initialized = {
        let conn = state.db.get()?;
        db::schema_exists(&conn)?
    };

    if initialized {
        require_admin(&state, &headers)?;
    }

    db::reset_schema(&state.db).map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::warn!("database schema dropped and recreated");
    Ok(Json(json!({ "ok": true })))
}

async fn delete_comment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

async fn delete_like(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM likes WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "ok": true })))
}

async fn delete_user(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db.get()?;

    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound);
    }

    db::cascade_delete_user(&mut conn, &id)?;
    tracing::warn!(admin = %admin.0.username, user_id = %id, "admin force-deleted user");
    Ok(Json(json!({ "ok": true })))
}

/// Bearer-token admin check for the one handler that cannot use the
/// `AdminUser` extractor (auth is conditional on store state).
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(AppError::Unauthorized)?;
    let claims = state.jwt.decode(token)?;

    let conn = state.db.get()?;
    let role: String = conn
        .query_row(
            "SELECT role FROM users WHERE id = ?1",
            params![claims.sub],
            |row| row.get(0),
        )
        .map_err(|_| AppError::NotFound)?;

    if !Role::parse(&role).is_admin() {
        return Err(AppError::denied(state.config.auth.strict_forbidden));
    }
    Ok(())
}
