// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile and session routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{MembershipTier, UserProfile};
use crate::services::quota::{QuotaPolicy, QuotaUsage};
use crate::services::session::{SessionHandle, SessionState};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const FALLBACK_DISPLAY_NAME: &str = "Rider";

/// API routes (require authentication via Firebase ID token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile", post(create_profile))
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/me/session", get(session_events))
        .route("/api/account", delete(delete_account))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileResponse {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub status: MembershipTier,
    pub created_at: String,
    /// Start of the current counting day, if any calculation was made
    pub last_calculation_at: Option<String>,
    pub quota: QuotaUsage,
}

impl ProfileResponse {
    fn new(profile: &UserProfile, policy: &QuotaPolicy) -> Self {
        let now = Utc::now();
        Self {
            uid: profile.uid.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            status: profile.status,
            created_at: profile.created_at.clone(),
            last_calculation_at: profile.last_calculation_at.map(format_utc_rfc3339),
            quota: policy.usage(profile, now),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateProfileRequest {
    /// Name entered at registration; federated sign-ins omit it
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub display_name: String,
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::BadRequest(e.to_string())
}

/// Build a fresh profile for `user`, preferring an explicit display name,
/// then the token's name, then the email's local part.
fn new_profile(user: &AuthUser, display_name: Option<&str>) -> UserProfile {
    let email = user.email.clone().unwrap_or_default();
    let display_name = display_name
        .map(str::trim)
        .or(user.name.as_deref())
        .or_else(|| email.split('@').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string();

    UserProfile::new(
        user.uid.clone(),
        display_name,
        email,
        &format_utc_rfc3339(Utc::now()),
    )
}

/// Create the profile for `user` if it does not exist yet.
///
/// A newly created profile is counted in the aggregate stats in the
/// background.
pub(crate) async fn ensure_profile(
    state: &AppState,
    user: &AuthUser,
    display_name: Option<&str>,
) -> Result<UserProfile> {
    let (profile, created) = state
        .db
        .create_profile_if_absent(&new_profile(user, display_name))
        .await?;

    if created {
        let db = state.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.adjust_user_count(1).await {
                tracing::warn!(error = %e, "Failed to count new user in stats");
            }
        });
    }

    Ok(profile)
}

/// Create the profile on first sign-in. Idempotent.
async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Option<Json<CreateProfileRequest>>, JsonRejection>,
) -> Result<Json<ProfileResponse>> {
    let Json(req) = body?.unwrap_or_default();
    req.validate().map_err(validation_error)?;

    let profile = ensure_profile(&state, &user, req.display_name.as_deref()).await?;
    Ok(Json(ProfileResponse::new(&profile, &state.quota_policy)))
}

/// Get current user profile with today's quota usage.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let profile = state
        .db
        .get_profile(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user.uid)))?;

    Ok(Json(ProfileResponse::new(&profile, &state.quota_policy)))
}

/// Edit the display name.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>> {
    let Json(req) = payload?;
    req.validate().map_err(validation_error)?;

    let profile = state
        .db
        .update_display_name(&user.uid, req.display_name.trim())
        .await?;

    tracing::info!(uid = %user.uid, "Updated display name");
    Ok(Json(ProfileResponse::new(&profile, &state.quota_policy)))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the user's profile document.
///
/// The Firebase identity itself is deleted by the client through the
/// identity provider.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(uid = %user.uid, "User-initiated account deletion");

    let deleted = state.db.delete_profile(&user.uid).await?;

    if deleted {
        let db = state.db.clone();
        tokio::spawn(async move {
            if let Err(e) = db.adjust_user_count(-1).await {
                tracing::warn!(error = %e, "Failed to uncount deleted user in stats");
            }
        });
    } else {
        tracing::warn!(uid = %user.uid, "Profile not found during deletion request");
    }

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account data deleted.".to_string(),
    }))
}

// ─── Live Session ────────────────────────────────────────────

/// Session state as pushed to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionView {
    Loading,
    SignedOut,
    LoadingProfile {
        uid: String,
    },
    SignedIn {
        uid: String,
        profile: Option<ProfileResponse>,
    },
}

impl SessionView {
    pub fn new(state: &SessionState, policy: &QuotaPolicy) -> Self {
        match state {
            SessionState::Loading => SessionView::Loading,
            SessionState::SignedOut => SessionView::SignedOut,
            SessionState::LoadingProfile { uid } => SessionView::LoadingProfile { uid: uid.clone() },
            SessionState::SignedIn { uid, profile } => SessionView::SignedIn {
                uid: uid.clone(),
                profile: profile.as_ref().map(|p| ProfileResponse::new(p, policy)),
            },
        }
    }
}

/// Stream session state changes as Server-Sent Events.
///
/// The current state is sent first. The stream ends after the session
/// signs out (token expiry); a client disconnect drops the stream, and with
/// it the session handle and its subscriptions.
async fn session_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let handle = SessionHandle::spawn(state.db.clone(), &user);
    let rx = handle.subscribe();
    let policy = state.quota_policy;

    tracing::debug!(uid = %user.uid, "Opened session stream");

    let events = stream::unfold(Some((handle, rx, true)), move |cursor| async move {
        let (handle, mut rx, first) = cursor?;
        if !first && rx.changed().await.is_err() {
            return None;
        }

        let current = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("session")
            .json_data(SessionView::new(&current, &policy));

        let next = if current == SessionState::SignedOut {
            None
        } else {
            Some((handle, rx, false))
        };
        Some((event, next))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(name: Option<&str>, email: Option<&str>) -> AuthUser {
        AuthUser {
            uid: "uid-1".to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_new_profile_display_name_fallbacks() {
        let u = user(Some("Token Name"), Some("rider@example.com"));
        assert_eq!(new_profile(&u, Some(" Chosen ")).display_name, "Chosen");
        assert_eq!(new_profile(&u, None).display_name, "Token Name");

        let u = user(None, Some("rider@example.com"));
        assert_eq!(new_profile(&u, None).display_name, "rider");

        let u = user(None, None);
        let profile = new_profile(&u, None);
        assert_eq!(profile.display_name, FALLBACK_DISPLAY_NAME);
        assert_eq!(profile.email, "");
        assert_eq!(profile.calculation_count, 0);
        assert_eq!(profile.status, MembershipTier::Free);
        assert!(profile.last_calculation_at.is_none());
    }

    #[test]
    fn test_update_request_validation() {
        let ok = UpdateProfileRequest {
            display_name: "Rider".to_string(),
        };
        assert!(ok.validate().is_ok());

        let long = "x".repeat(65);
        for bad in ["", "   ", long.as_str()] {
            let req = UpdateProfileRequest {
                display_name: bad.to_string(),
            };
            assert!(req.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_session_view_serialization() {
        let policy = QuotaPolicy::new(50, chrono::FixedOffset::east_opt(0).unwrap());

        let json = serde_json::to_value(SessionView::new(&SessionState::SignedOut, &policy)).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "signed_out" }));

        let profile = UserProfile::new("u1", "Rider", "rider@example.com", "2026-01-01T00:00:00Z");
        let state = SessionState::SignedIn {
            uid: "u1".to_string(),
            profile: Some(profile),
        };
        let json = serde_json::to_value(SessionView::new(&state, &policy)).unwrap();
        assert_eq!(json["state"], "signed_in");
        assert_eq!(json["profile"]["status"], "Free User");
        assert_eq!(json["profile"]["quota"]["remaining"], 50);
    }
}
