// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token authentication middleware.

use crate::error::AppError;
use crate::services::firebase_auth::{extract_bearer_token, TokenError, VerifiedIdentity};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// Cookie the web client may use instead of an `Authorization` header
/// (EventSource cannot set headers).
pub const SESSION_COOKIE: &str = "motocalc_session";

/// Authenticated user extracted from the ID token.
pub type AuthUser = VerifiedIdentity;

/// Middleware that requires a valid Firebase ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Header first, then cookie
    let header_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string);

    let token = match header_token {
        Some(token) => token,
        None => jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(AppError::Unauthorized)?,
    };

    let user: AuthUser = state
        .token_verifier
        .verify_id_token(&token)
        .await
        .map_err(|e| match e {
            TokenError::Rejected(reason) => {
                tracing::debug!(reason = %reason, "Rejected ID token");
                AppError::InvalidToken
            }
            TokenError::Transient(reason) => AppError::Identity(reason),
        })?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
