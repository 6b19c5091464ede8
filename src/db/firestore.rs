// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - User profiles (create, read, edit, delete)
//! - Quota reservations (atomic check-and-increment on the profile)
//! - Application stats (best-effort aggregate counters)
//! - Live profile snapshots (Firestore listen stream)

use crate::db::{collections, APP_STATS_DOC};
use crate::error::AppError;
use crate::models::{AppStats, UserProfile};
use crate::services::quota::{QuotaDecision, QuotaPolicy};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreListenEvent, FirestoreListener, FirestoreListenerTarget,
    FirestoreMemListenStateStorage,
};
use tokio::sync::mpsc;

/// Attempts per transaction before giving up on contention.
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Listener target id of the profile document. Each listener watches one
/// document, so a fixed id is enough.
const PROFILE_LISTEN_TARGET: u32 = 1;

/// Map a Firestore error from inside a transaction.
///
/// `Aborted` means the transaction lost a conflict and wrote nothing; every
/// other failure, including an unavailable commit whose outcome is unknown,
/// is final.
fn transaction_error(context: &str, e: FirestoreError) -> AppError {
    match &e {
        FirestoreError::DatabaseError(db_err) if db_err.public.code == "Aborted" => {
            AppError::Contention(format!("{}: {}", context, e))
        }
        _ => AppError::Database(format!("{}: {}", context, e)),
    }
}

/// Turn a listen event into a profile snapshot, if it carries one.
///
/// A deleted document yields `Some(None)`.
fn profile_snapshot(uid: &str, event: FirestoreListenEvent) -> Option<Option<UserProfile>> {
    match event {
        FirestoreListenEvent::DocumentChange(change) => {
            let doc = change.document?;
            match firestore::FirestoreDb::deserialize_doc_to::<UserProfile>(&doc) {
                Ok(profile) => Some(Some(profile)),
                Err(e) => {
                    tracing::warn!(uid, error = %e, "Skipping unreadable profile snapshot");
                    None
                }
            }
        }
        FirestoreListenEvent::DocumentDelete(_) | FirestoreListenEvent::DocumentRemove(_) => {
            Some(None)
        }
        _ => None,
    }
}

/// A Firestore listener on one profile document.
///
/// Dropping it shuts the listener down.
pub struct ProfileListener {
    listener: Option<FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>>,
}

impl Drop for ProfileListener {
    fn drop(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };
        // Without a runtime the listener task is already gone
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = listener.shutdown().await {
                    tracing::warn!(error = %e, "Failed to shut down profile listener");
                }
            });
        }
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Run the transaction `op` until it succeeds, fails with anything but
    /// contention, or runs out of attempts.
    async fn with_retries<T, F, Fut>(&self, what: &str, op: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(AppError::Contention(msg)) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::debug!(attempt, error = %msg, "{} failed, retrying", what);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a user profile by uid.
    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a profile unless one already exists.
    ///
    /// Returns the stored profile and whether it was created by this call.
    pub async fn create_profile_if_absent(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError> {
        self.with_retries("Profile creation", move || self.try_create_profile(profile))
            .await
    }

    async fn try_create_profile(
        &self,
        profile: &UserProfile,
    ) -> Result<(UserProfile, bool), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| transaction_error("Failed to begin transaction", e))?;

        let existing: Option<UserProfile> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&profile.uid)
            .await
            .map_err(|e| transaction_error("Failed to read profile in transaction", e))?;

        if let Some(existing) = existing {
            let _ = transaction.rollback().await;
            return Ok((existing, false));
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&profile.uid)
            .object(profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| transaction_error("Failed to add profile to transaction", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| transaction_error("Transaction commit failed", e))?;

        tracing::info!(uid = %profile.uid, "Created user profile");
        Ok((profile.clone(), true))
    }

    /// Change a profile's display name.
    ///
    /// Only the display name field is written, so a concurrent quota
    /// update on the same document is not overwritten.
    pub async fn update_display_name(
        &self,
        uid: &str,
        display_name: &str,
    ) -> Result<UserProfile, AppError> {
        let mut profile = self
            .get_profile(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", uid)))?;
        profile.display_name = display_name.to_string();

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields([UserProfile::DISPLAY_NAME_FIELD])
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(profile)
    }

    /// Delete a profile. Returns `false` if it did not exist.
    pub async fn delete_profile(&self, uid: &str) -> Result<bool, AppError> {
        if self.get_profile(uid).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::USERS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(uid, "Deleted user profile");
        Ok(true)
    }

    /// Stream snapshots of `users/{uid}` into `snapshots`.
    ///
    /// The current document is sent first, then every change the listen
    /// stream delivers; a deleted document is sent as `None`. Snapshots stop
    /// when the returned listener is dropped.
    pub async fn listen_profile(
        &self,
        uid: &str,
        snapshots: mpsc::Sender<Option<UserProfile>>,
    ) -> Result<ProfileListener, AppError> {
        let client = self.get_client()?;

        // Read before listening: the listen stream's initial snapshot is at
        // least as new as this one.
        let current = self.get_profile(uid).await?;
        if snapshots.send(current).await.is_err() {
            return Ok(ProfileListener { listener: None });
        }

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(|e| AppError::Database(format!("Failed to create listener: {}", e)))?;

        client
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .batch_listen([uid])
            .add_target(
                FirestoreListenerTarget::new(PROFILE_LISTEN_TARGET),
                &mut listener,
            )
            .map_err(|e| AppError::Database(format!("Failed to add listener target: {}", e)))?;

        let listen_uid = uid.to_string();
        listener
            .start(move |event| {
                let snapshots = snapshots.clone();
                let snapshot = profile_snapshot(&listen_uid, event);
                async move {
                    if let Some(profile) = snapshot {
                        // The session may already be gone
                        let _ = snapshots.send(profile).await;
                    }
                    Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                }
            })
            .await
            .map_err(|e| AppError::Database(format!("Failed to start listener: {}", e)))?;

        tracing::debug!(uid, "Listening for profile changes");
        Ok(ProfileListener {
            listener: Some(listener),
        })
    }

    // ─── Quota ───────────────────────────────────────────────────

    /// Atomically check the daily quota and count one calculation.
    ///
    /// The profile is read and written inside one Firestore transaction, so
    /// concurrent requests for the same user serialize on the document
    /// instead of both passing the limit check. Returns the decision and the
    /// profile as stored afterwards.
    pub async fn reserve_calculation(
        &self,
        uid: &str,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<(QuotaDecision, UserProfile), AppError> {
        self.with_retries("Quota reservation", move || {
            self.try_reserve_calculation(uid, policy, now)
        })
        .await
    }

    async fn try_reserve_calculation(
        &self,
        uid: &str,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<(QuotaDecision, UserProfile), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| transaction_error("Failed to begin transaction", e))?;

        // Read within the transaction so the document is locked until commit
        let current: Option<UserProfile> = client
            .clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| transaction_error("Failed to read profile in transaction", e))?;

        let Some(mut profile) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!("Profile {} not found", uid)));
        };

        let decision = policy.apply(&mut profile, now);
        if let QuotaDecision::Exceeded { .. } = decision {
            let _ = transaction.rollback().await;
            return Ok((decision, profile));
        }

        client
            .fluent()
            .update()
            .fields(UserProfile::QUOTA_FIELDS)
            .in_col(collections::USERS)
            .document_id(uid)
            .object(&profile)
            .add_to_transaction(&mut transaction)
            .map_err(|e| transaction_error("Failed to add profile to transaction", e))?;

        transaction
            .commit()
            .await
            .map_err(|e| transaction_error("Transaction commit failed", e))?;

        tracing::debug!(
            uid,
            count = profile.calculation_count,
            "Calculation counted against quota"
        );

        Ok((decision, profile))
    }

    // ─── App Stats Operations ────────────────────────────────────

    /// Get the aggregate stats document.
    pub async fn get_app_stats(&self) -> Result<Option<AppStats>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::APP_STATS)
            .obj()
            .one(APP_STATS_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count one calculation in the aggregate stats.
    pub async fn record_calculation_stat(
        &self,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.update_app_stats(|stats| stats.record_calculation(now, |at| policy.day_of(at)))
            .await
    }

    /// Adjust the registered user count by `delta`.
    pub async fn adjust_user_count(&self, delta: i64) -> Result<(), AppError> {
        self.update_app_stats(|stats| stats.adjust_users(delta))
            .await
    }

    /// Read-modify-write the stats document in a transaction.
    async fn update_app_stats<F>(&self, update: F) -> Result<(), AppError>
    where
        F: Fn(&mut AppStats),
    {
        let update = &update;
        self.with_retries("Stats update", move || async move {
            let client = self.get_client()?;

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| transaction_error("Failed to begin transaction", e))?;

            let current: Option<AppStats> = client
                .clone_with_consistency_selector(
                    firestore::FirestoreConsistencySelector::Transaction(
                        transaction.transaction_id().clone(),
                    ),
                )
                .fluent()
                .select()
                .by_id_in(collections::APP_STATS)
                .obj()
                .one(APP_STATS_DOC)
                .await
                .map_err(|e| transaction_error("Failed to read stats in transaction", e))?;

            let mut stats = current.unwrap_or_default();
            update(&mut stats);
            stats.updated_at = format_utc_rfc3339(Utc::now());

            client
                .fluent()
                .update()
                .in_col(collections::APP_STATS)
                .document_id(APP_STATS_DOC)
                .object(&stats)
                .add_to_transaction(&mut transaction)
                .map_err(|e| transaction_error("Failed to add stats to transaction", e))?;

            transaction
                .commit()
                .await
                .map_err(|e| transaction_error("Transaction commit failed", e))?;

            Ok(())
        })
        .await
    }
}
