use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use rusqlite::params;

use crate::db::models::Role;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller. `role` is the snapshot embedded in the token at
/// issuance, not re-read from the users row; ownership checks trust it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Extractor that requires a valid bearer token.
/// Returns 401 on a missing/invalid/expired token, 404 when the token is
/// valid but the subject user row no longer exists.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.jwt.decode(token)?;

        let conn = state.db.get()?;
        let username: String = conn
            .query_row(
                "SELECT username FROM users WHERE id = ?1",
                params![claims.sub],
                |row| row.get(0),
            )
            .map_err(|_| AppError::NotFound)?;

        Ok(CurrentUser {
            id: claims.sub,
            username,
            role: claims.role,
        })
    }
}

/// Extractor for admin-only endpoints. Unlike `CurrentUser` the role is
/// re-resolved from the current users row, so a demoted admin holding an old
/// token is still locked out.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.jwt.decode(token)?;

        let conn = state.db.get()?;
        let (username, role): (String, String) = conn
            .query_row(
                "SELECT username, role FROM users WHERE id = ?1",
                params![claims.sub],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| AppError::NotFound)?;

        let role = Role::parse(&role);
        if !role.is_admin() {
            return Err(AppError::denied(state.config.auth.strict_forbidden));
        }

        Ok(AdminUser(CurrentUser {
            id: claims.sub,
            username,
            role,
        }))
    }
}

pub fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn bearer_token_extracted() {
        let parts = parts_with_auth(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert_eq!(extract_bearer_token(&parts), None);
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer_token(&parts), None);
    }

    #[test]
    fn empty_bearer_yields_none() {
        let parts = parts_with_auth(Some("Bearer "));
        assert_eq!(extract_bearer_token(&parts), None);
    }
}
