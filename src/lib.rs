// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! motocalc: motorcycle engine calculators behind a per-user daily quota
//!
//! This crate provides the backend API for the calculator dashboard:
//! formula evaluators, Firebase-authenticated user profiles, and the
//! daily usage quota stored in Firestore.

pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{FirebaseTokenVerifier, QuotaPolicy};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub token_verifier: Arc<FirebaseTokenVerifier>,
    pub quota_policy: QuotaPolicy,
}
