// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use motocalc::config::Config;
use motocalc::db::FirestoreDb;
use motocalc::routes::create_router;
use motocalc::services::{FirebaseTokenVerifier, QuotaPolicy};
use motocalc::AppState;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key id and secret of the static test signing key.
#[allow(dead_code)]
pub const TEST_KID: &str = "test-kid";
#[allow(dead_code)]
pub const TEST_SECRET: &[u8] = b"firebase-test-secret";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Generate a unique uid for test isolation.
#[allow(dead_code)]
pub fn unique_uid(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}")
}

/// Create a Firebase-style ID token for `uid`, signed with the test key.
#[allow(dead_code)]
pub fn create_test_token(uid: &str) -> String {
    create_test_token_expiring_in(uid, 3600)
}

#[allow(dead_code)]
pub fn create_test_token_expiring_in(uid: &str, valid_secs: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        iss: String,
        aud: String,
        sub: String,
        exp: i64,
        iat: i64,
        auth_time: i64,
        email: String,
        name: String,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        iss: "https://securetoken.google.com/test-project".to_string(),
        aud: "test-project".to_string(),
        sub: uid.to_string(),
        exp: now + valid_secs,
        iat: now,
        auth_time: now,
        email: "rider@example.com".to_string(),
        name: "Test Rider".to_string(),
    };

    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, &claims, &EncodingKey::from_secret(TEST_SECRET)).unwrap()
}

/// Create a test app around `db` with a static-key token verifier.
#[allow(dead_code)]
pub fn create_test_app_with_db(db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let token_verifier = Arc::new(
        FirebaseTokenVerifier::new_with_static_key(
            &config,
            TEST_KID,
            Algorithm::HS256,
            DecodingKey::from_secret(TEST_SECRET),
        )
        .unwrap(),
    );
    let quota_policy = QuotaPolicy::from_config(&config);

    let state = Arc::new(AppState {
        config,
        db,
        token_verifier,
        quota_policy,
    });

    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_db(test_db_offline())
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
