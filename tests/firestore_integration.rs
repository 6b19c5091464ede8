// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running, e.g.
//! `gcloud emulators firestore start --host-port=localhost:8081` and
//! `FIRESTORE_EMULATOR_HOST=localhost:8081 cargo test`.
//!
//! Each test uses its own uid, so runs do not interfere.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::{Duration, FixedOffset, TimeZone, Utc};
use motocalc::db::FirestoreDb;
use motocalc::error::AppError;
use motocalc::models::{MembershipTier, UserProfile};
use motocalc::services::{QuotaDecision, QuotaPolicy};
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app_with_db, create_test_token, test_db, unique_uid};

const DAILY_LIMIT: u32 = 50;
const NUM_CONCURRENT_RESERVATIONS: u32 = 8;

fn policy() -> QuotaPolicy {
    QuotaPolicy::new(DAILY_LIMIT, FixedOffset::east_opt(0).unwrap())
}

/// Helper to create and store a basic profile
async fn stored_profile(db: &FirestoreDb, uid: &str) -> UserProfile {
    let profile = UserProfile::new(uid, "Test Rider", "rider@example.com", "2026-01-01T00:00:00Z");
    let (stored, created) = db.create_profile_if_absent(&profile).await.unwrap();
    assert!(created);
    stored
}

/// Reserve `count` calculations at `at`, all of which must be allowed.
async fn use_quota(db: &FirestoreDb, uid: &str, count: u32, at: chrono::DateTime<Utc>) {
    for _ in 0..count {
        let (decision, _) = db.reserve_calculation(uid, &policy(), at).await.unwrap();
        assert!(matches!(decision, QuotaDecision::Allowed { .. }));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_profile_create_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("profile");

    assert!(db.get_profile(&uid).await.unwrap().is_none());

    let first = stored_profile(&db, &uid).await;
    assert_eq!(first.status, MembershipTier::Free);
    assert_eq!(first.calculation_count, 0);
    assert!(first.last_calculation_at.is_none());

    // Second creation returns the stored profile untouched
    let other = UserProfile::new(uid.as_str(), "Someone Else", "x@example.com", "2030-01-01T00:00:00Z");
    let (second, created) = db.create_profile_if_absent(&other).await.unwrap();
    assert!(!created);
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_update_display_name_and_delete() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("edit");
    stored_profile(&db, &uid).await;

    let updated = db.update_display_name(&uid, "Renamed").await.unwrap();
    assert_eq!(updated.display_name, "Renamed");
    assert_eq!(
        db.get_profile(&uid).await.unwrap().unwrap().display_name,
        "Renamed"
    );

    assert!(db.delete_profile(&uid).await.unwrap());
    assert!(db.get_profile(&uid).await.unwrap().is_none());
    assert!(!db.delete_profile(&uid).await.unwrap());

    let missing = db.update_display_name(&uid, "Ghost").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

/// Wait for the next snapshot from a profile listener.
async fn next_snapshot(
    rx: &mut tokio::sync::mpsc::Receiver<Option<UserProfile>>,
) -> Option<UserProfile> {
    tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
        .await
        .expect("snapshot timed out")
        .expect("listener closed")
}

#[tokio::test]
async fn test_profile_listener_pushes_changes() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("listen");
    stored_profile(&db, &uid).await;

    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let listener = db.listen_profile(&uid, tx).await.unwrap();

    let first = next_snapshot(&mut rx).await.unwrap();
    assert_eq!(first.display_name, "Test Rider");

    db.update_display_name(&uid, "Renamed").await.unwrap();
    // The listen stream replays the current document before changes
    let mut latest = next_snapshot(&mut rx).await;
    while latest.as_ref().is_some_and(|p| p.display_name != "Renamed") {
        latest = next_snapshot(&mut rx).await;
    }
    assert_eq!(latest.unwrap().display_name, "Renamed");

    db.delete_profile(&uid).await.unwrap();
    assert!(next_snapshot(&mut rx).await.is_none());

    drop(listener);
}

// ═══════════════════════════════════════════════════════════════════════════
// QUOTA TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_limit_reached_today_is_refused() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("quota-full");
    stored_profile(&db, &uid).await;

    let today = Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap();
    use_quota(&db, &uid, DAILY_LIMIT, today).await;

    let (decision, profile) = db
        .reserve_calculation(&uid, &policy(), today + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(decision, QuotaDecision::Exceeded { limit: DAILY_LIMIT });
    assert_eq!(profile.calculation_count, DAILY_LIMIT);

    // Refusal did not write anything
    let stored = db.get_profile(&uid).await.unwrap().unwrap();
    assert_eq!(stored.calculation_count, DAILY_LIMIT);
}

#[tokio::test]
async fn test_new_day_resets_counter_to_one() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("quota-reset");
    stored_profile(&db, &uid).await;

    let yesterday = Utc.with_ymd_and_hms(2026, 5, 9, 20, 0, 0).unwrap();
    use_quota(&db, &uid, DAILY_LIMIT, yesterday).await;

    let today = yesterday + Duration::hours(6);
    let (decision, profile) = db.reserve_calculation(&uid, &policy(), today).await.unwrap();
    assert_eq!(
        decision,
        QuotaDecision::Allowed {
            count: 1,
            reset: true
        }
    );
    assert_eq!(profile.calculation_count, 1);
    assert_eq!(profile.last_calculation_at, Some(today));
}

#[tokio::test]
async fn test_premium_is_never_refused() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("quota-premium");
    let mut profile = UserProfile::new(uid.as_str(), "Premium Rider", "p@example.com", "2026-01-01T00:00:00Z");
    profile.status = MembershipTier::Premium;
    db.create_profile_if_absent(&profile).await.unwrap();

    let now = Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap();
    use_quota(&db, &uid, DAILY_LIMIT + 5, now).await;

    let stored = db.get_profile(&uid).await.unwrap().unwrap();
    assert_eq!(stored.calculation_count, DAILY_LIMIT + 5);
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let result = db
        .reserve_calculation(&unique_uid("ghost"), &policy(), Utc::now())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_reservations_never_exceed_limit() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("quota-race");
    stored_profile(&db, &uid).await;

    let now = Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap();
    // Leave room for only a few of the concurrent requests
    let headroom = 3;
    use_quota(&db, &uid, DAILY_LIMIT - headroom, now).await;

    let mut handles = vec![];
    for _ in 0..NUM_CONCURRENT_RESERVATIONS {
        let db_clone = db.clone();
        let uid = uid.clone();
        handles.push(tokio::spawn(async move {
            db_clone.reserve_calculation(&uid, &policy(), now).await
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        // Contention may exhaust retries; that is a failure, never an overrun
        if let Ok((QuotaDecision::Allowed { .. }, _)) = handle.await.unwrap() {
            allowed += 1;
        }
    }

    let stored = db.get_profile(&uid).await.unwrap().unwrap();
    assert!(allowed <= headroom, "allowed {allowed} of {headroom}");
    assert_eq!(stored.calculation_count, DAILY_LIMIT - headroom + allowed);
    assert!(stored.calculation_count <= DAILY_LIMIT);
}

// ═══════════════════════════════════════════════════════════════════════════
// STATS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_stats_counters() {
    require_emulator!();

    let db = test_db().await;
    let before = db.get_app_stats().await.unwrap().unwrap_or_default();

    db.adjust_user_count(1).await.unwrap();
    let now = Utc::now();
    db.record_calculation_stat(&policy(), now).await.unwrap();

    let after = db.get_app_stats().await.unwrap().unwrap();
    assert_eq!(after.total_users, before.total_users + 1);
    assert!(after.calculations_on(now, |at| policy().day_of(at)) >= 1);
    assert!(!after.updated_at.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// HTTP FLOW
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_calculation_flow_counts_quota() {
    require_emulator!();

    let db = test_db().await;
    let (app, _) = create_test_app_with_db(db.clone());
    let uid = unique_uid("http");
    let token = create_test_token(&uid);

    let calc = |body: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/api/calc/piston-speed")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    // Profile is created on demand by the first calculation
    let response = app
        .clone()
        .oneshot(calc(r#"{"stroke":60,"rpm":10000}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["quota"]["count"], 1);
    assert_eq!(body["quota"]["remaining"], DAILY_LIMIT - 1);

    // Invalid input does not consume quota
    let response = app
        .clone()
        .oneshot(calc(r#"{"stroke":"abc","rpm":10000}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.get_profile(&uid).await.unwrap().unwrap().calculation_count, 1);

    // Exhaust the rest of today's quota directly
    use_quota(&db, &uid, DAILY_LIMIT - 1, Utc::now()).await;

    let response = app
        .clone()
        .oneshot(calc(r#"{"stroke":60,"rpm":10000}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["error"], "quota_exceeded");
    assert!(body.get("result").is_none());
}
