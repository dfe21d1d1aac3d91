//! Bearer-token authentication extractor.
//!
//! Extracts and verifies access tokens from:
//! - `Authorization: Bearer <token>` header
//! - `X-API-Key: <token>` header
//!
//! Tokens are SHA-256 hashed and compared against the `access_tokens` table,
//! which stands in for the external identity provider: each token maps to a
//! `{principal_id, role}` pair. This core performs authorization checks with
//! that pair but never issues or validates real credentials.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use exhale_types::identity::{Principal, Role};

use crate::http::error::AppError;
use crate::state::AppState;

impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Extract the token from headers
        let token = extract_token(parts)?;

        // Hash the provided token
        let token_hash = hash_token(&token);

        // Resolve to a principal
        let result =
            sqlx::query("SELECT id, principal_id, role FROM access_tokens WHERE token_hash = ?")
                .bind(&token_hash)
                .fetch_optional(&state.db_pool.reader)
                .await
                .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match result {
            Some(row) => {
                let principal_id: String = row.get("principal_id");
                let role: String = row.get("role");
                let principal_id = principal_id
                    .parse::<Uuid>()
                    .map_err(|e| AppError::Internal(format!("Corrupt principal id: {e}")))?;
                let role = role
                    .parse::<Role>()
                    .map_err(|e| AppError::Internal(format!("Corrupt role: {e}")))?;

                // Update last_used_at (best effort, don't fail the request)
                let id: String = row.get("id");
                let now = chrono::Utc::now().to_rfc3339();
                let _ = sqlx::query("UPDATE access_tokens SET last_used_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(&id)
                    .execute(&state.db_pool.writer)
                    .await;

                Ok(Principal::new(principal_id, role))
            }
            None => Err(AppError::Unauthorized(
                "Invalid access token. Provide a valid token via 'Authorization: Bearer <token>' or 'X-API-Key: <token>' header.".to_string(),
            )),
        }
    }
}

/// Extract the access token from request headers.
fn extract_token(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <token>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(token) = parts.headers.get("x-api-key") {
        let token_str = token.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(token_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing access token. Provide via 'Authorization: Bearer <token>' or 'X-API-Key: <token>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an access token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{:x}", digest)
}

/// Issue a new access token for a principal and store its hash.
///
/// Returns the plaintext token; it is shown once and never stored.
pub async fn issue_token(
    state: &AppState,
    principal_id: Uuid,
    role: Role,
    name: Option<&str>,
) -> anyhow::Result<String> {
    let plaintext = format!(
        "exh_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    );
    let token_hash = hash_token(&plaintext);
    let id = Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO access_tokens (id, token_hash, principal_id, role, name, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&token_hash)
    .bind(principal_id.to_string())
    .bind(role.to_string())
    .bind(name)
    .bind(&now)
    .execute(&state.db_pool.writer)
    .await?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("exh_deadbeef");
        let b = hash_token("exh_deadbeef");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_tokens_hash_differently() {
        assert_ne!(hash_token("exh_one"), hash_token("exh_two"));
    }
}
