// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live profile session.
//!
//! A session starts in `Loading`. An identity change moves it to
//! `SignedOut` (dropping any cached profile) or to `LoadingProfile`; the
//! first profile snapshot for that identity moves it to `SignedIn`, and later
//! snapshots only replace the cached profile.
//!
//! [`SessionHandle`] drives the state machine from two subscriptions: an
//! identity watcher that signs the session out when the token expires, and a
//! Firestore listener on the profile document. Dropping the handle cancels
//! both.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::UserProfile;
use crate::services::firebase_auth::VerifiedIdentity;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Nothing known yet
    Loading,
    SignedOut,
    /// Identity known, waiting for the first profile snapshot
    LoadingProfile { uid: String },
    /// `profile` is `None` when the identity has no profile document
    SignedIn {
        uid: String,
        profile: Option<UserProfile>,
    },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            SessionState::Loading | SessionState::LoadingProfile { .. }
        )
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionState::SignedIn { profile, .. } => profile.as_ref(),
            _ => None,
        }
    }

    fn uid(&self) -> Option<&str> {
        match self {
            SessionState::LoadingProfile { uid } | SessionState::SignedIn { uid, .. } => {
                Some(uid)
            }
            SessionState::Loading | SessionState::SignedOut => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The signed-in identity changed; `None` means signed out
    IdentityChanged(Option<String>),
    /// A profile document snapshot was delivered for `uid`
    ProfileSnapshot {
        uid: String,
        profile: Option<UserProfile>,
    },
}

/// The session state machine.
#[derive(Debug, Clone)]
pub struct ProfileSession {
    state: SessionState,
}

impl Default for ProfileSession {
    fn default() -> Self {
        Self {
            state: SessionState::Loading,
        }
    }
}

impl ProfileSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply an event. Returns `true` if the state changed.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        let next = match event {
            SessionEvent::IdentityChanged(None) => SessionState::SignedOut,
            SessionEvent::IdentityChanged(Some(uid)) => {
                if self.state.uid() == Some(uid.as_str()) {
                    // Same identity refreshed its token; keep the cached profile
                    return false;
                }
                SessionState::LoadingProfile { uid }
            }
            SessionEvent::ProfileSnapshot { uid, profile } => {
                if self.state.uid() != Some(uid.as_str()) {
                    tracing::debug!(uid = %uid, "Ignoring snapshot for inactive identity");
                    return false;
                }
                SessionState::SignedIn { uid, profile }
            }
        };

        if next == self.state {
            return false;
        }
        self.state = next;
        true
    }
}

/// A running session. Dropping it tears down both subscriptions.
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    /// Start a session for `identity`, following the profile document
    /// through a Firestore listener until the identity token expires.
    pub fn spawn(db: FirestoreDb, identity: &VerifiedIdentity) -> Self {
        Self::spawn_with(identity, move |uid, snapshots| async move {
            db.listen_profile(&uid, snapshots).await
        })
    }

    /// Like [`SessionHandle::spawn`], with a custom profile subscription.
    ///
    /// `subscribe` is called once with the uid and a sender for snapshots.
    /// The subscription it returns is kept alive until the session ends and
    /// then dropped.
    pub fn spawn_with<F, Fut, S>(identity: &VerifiedIdentity, subscribe: F) -> Self
    where
        F: FnOnce(String, mpsc::Sender<Option<UserProfile>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<S, AppError>> + Send + 'static,
        S: Send + 'static,
    {
        let uid = identity.uid.clone();
        let mut session = ProfileSession::new();
        session.apply(SessionEvent::IdentityChanged(Some(uid.clone())));

        let (state_tx, state_rx) = watch::channel(session.state().clone());
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let tasks = vec![
            tokio::spawn(drive(session, event_rx, state_tx)),
            tokio::spawn(watch_identity(identity.expires_at, event_tx.clone())),
            tokio::spawn(watch_profile(uid, subscribe, event_tx)),
        ];

        Self {
            state: state_rx,
            tasks,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // Aborting the profile task drops its subscription, which shuts the
        // listener down.
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Apply events in order and publish each new state.
async fn drive(
    mut session: ProfileSession,
    mut events: mpsc::Receiver<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
) {
    while let Some(event) = events.recv().await {
        if session.apply(event) {
            let state = session.state().clone();
            let signed_out = state == SessionState::SignedOut;
            if state_tx.send(state).is_err() || signed_out {
                break;
            }
        }
    }
}

/// Sign out when the identity token expires.
async fn watch_identity(expires_at: DateTime<Utc>, events: mpsc::Sender<SessionEvent>) {
    let remaining = (expires_at - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(remaining).await;

    tracing::debug!("Identity token expired, ending session");
    let _ = events.send(SessionEvent::IdentityChanged(None)).await;
}

/// Subscribe to the profile document and forward its snapshots.
async fn watch_profile<F, Fut, S>(uid: String, subscribe: F, events: mpsc::Sender<SessionEvent>)
where
    F: FnOnce(String, mpsc::Sender<Option<UserProfile>>) -> Fut,
    Fut: Future<Output = Result<S, AppError>>,
{
    let (snapshot_tx, mut snapshots) = mpsc::channel(EVENT_BUFFER);

    // Held for as long as snapshots are forwarded
    let _subscription = match subscribe(uid.clone(), snapshot_tx).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(uid = %uid, error = %e, "Failed to subscribe to profile");
            return;
        }
    };

    while let Some(profile) = snapshots.recv().await {
        let event = SessionEvent::ProfileSnapshot {
            uid: uid.clone(),
            profile,
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
}
