//! `AdminGuard` extractor for the `/ops` endpoints.
//!
//! Handlers opt in by adding `_guard: AdminGuard` to their parameters. If
//! `admin.token_env` (default `PA_ADMIN_TOKEN`) is unset, all requests pass.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;

use crate::state::AppState;

use super::api_error;
use super::auth::token_matches;

pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = &state.admin_token_hash else {
            return Ok(AdminGuard);
        };
        if !token_matches(&parts.headers, expected) {
            return Err(api_error(StatusCode::UNAUTHORIZED, "invalid admin token"));
        }
        Ok(AdminGuard)
    }
}
